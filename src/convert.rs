//! Rule format conversion - legacy <-> modern AT syntax
//!
//! Modern: `<access> <owner.Class> [<member>[<descriptor>]] [# comment]`
//! Legacy: `<access> <owner/Class>.<member>[<descriptor>] [# comment]`
//!
//! Legacy owners may use `/` or `.` separators. Class-only legacy lines carry
//! no member separator after the last `/`. Blank lines, comments and lines
//! that already have three tokens pass through untouched.

use crate::error::RuleFormatError;

/// Line-oriented rewriting between the two rule syntaxes
pub trait RuleConverter {
    fn to_modern(&self, origin: &str, text: &str) -> Result<String, RuleFormatError>;
    fn to_legacy(&self, origin: &str, text: &str) -> Result<String, RuleFormatError>;
}

const ACCESS_LEVELS: &[&str] = &["public", "protected", "private", "default"];

fn is_access_token(token: &str) -> bool {
    let level = token
        .strip_suffix("-f")
        .or_else(|| token.strip_suffix("+f"))
        .unwrap_or(token);
    ACCESS_LEVELS.contains(&level)
}

/// A rule line split into its code and trailing comment
struct Line<'a> {
    tokens: Vec<&'a str>,
    comment: Option<&'a str>,
}

impl<'a> Line<'a> {
    fn split(raw: &'a str) -> Self {
        let (code, comment) = match raw.find('#') {
            Some(idx) => (&raw[..idx], Some(raw[idx..].trim_end())),
            None => (raw, None),
        };
        Self {
            tokens: code.split_whitespace().collect(),
            comment,
        }
    }

    fn render(&self, body: String) -> String {
        match self.comment {
            Some(comment) => format!("{} {}", body, comment),
            None => body,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyRuleConverter;

impl LegacyRuleConverter {
    pub fn new() -> Self {
        Self
    }

    fn check_access(origin: &str, line_no: usize, access: &str) -> Result<(), RuleFormatError> {
        if is_access_token(access) {
            Ok(())
        } else {
            Err(RuleFormatError::new(
                origin,
                line_no,
                format!("unknown access modifier {:?}", access),
            ))
        }
    }

    /// Split a legacy target into (owner, member + descriptor)
    fn split_legacy_target<'t>(target: &'t str) -> (&'t str, Option<&'t str>) {
        let member_sep = if let Some(paren) = target.find('(') {
            target[..paren].rfind('.')
        } else if let Some(slash) = target.rfind('/') {
            target[slash + 1..].rfind('.').map(|dot| slash + 1 + dot)
        } else {
            target.rfind('.')
        };
        match member_sep {
            Some(dot) => (&target[..dot], Some(&target[dot + 1..])),
            None => (target, None),
        }
    }

    fn line_to_modern(origin: &str, line_no: usize, raw: &str) -> Result<String, RuleFormatError> {
        let line = Line::split(raw);
        match line.tokens.as_slice() {
            [] => Ok(raw.to_string()),
            [_] => Err(RuleFormatError::new(origin, line_no, "missing target after access modifier")),
            [access, target] => {
                Self::check_access(origin, line_no, access)?;
                let (owner, member) = Self::split_legacy_target(target);
                let owner = owner.replace('/', ".");
                if owner.is_empty() || owner.ends_with('.') {
                    return Err(RuleFormatError::new(origin, line_no, "empty owner class"));
                }
                let body = match member {
                    Some("") => {
                        return Err(RuleFormatError::new(origin, line_no, "empty member name"));
                    }
                    Some(member) if member.starts_with('(') => {
                        return Err(RuleFormatError::new(origin, line_no, "descriptor without member name"));
                    }
                    Some(member) => format!("{} {} {}", access, owner, member),
                    None => format!("{} {}", access, owner),
                };
                Ok(line.render(body))
            }
            _ => Ok(raw.to_string()),
        }
    }

    fn line_to_legacy(origin: &str, line_no: usize, raw: &str) -> Result<String, RuleFormatError> {
        let line = Line::split(raw);
        let body = match line.tokens.as_slice() {
            [] => return Ok(raw.to_string()),
            [_] => {
                return Err(RuleFormatError::new(origin, line_no, "missing target after access modifier"));
            }
            [access, owner] => {
                Self::check_access(origin, line_no, access)?;
                format!("{} {}", access, owner.replace('.', "/"))
            }
            [access, owner, member] => {
                Self::check_access(origin, line_no, access)?;
                format!("{} {}.{}", access, owner.replace('.', "/"), member)
            }
            _ => {
                return Err(RuleFormatError::new(origin, line_no, "too many tokens for a rule line"));
            }
        };
        Ok(line.render(body))
    }
}

fn rewrite_lines<F>(text: &str, mut rewrite: F) -> Result<String, RuleFormatError>
where
    F: FnMut(usize, &str) -> Result<String, RuleFormatError>,
{
    let mut out = String::with_capacity(text.len() + 16);
    for (idx, raw) in text.lines().enumerate() {
        out.push_str(&rewrite(idx + 1, raw)?);
        out.push('\n');
    }
    Ok(out)
}

impl RuleConverter for LegacyRuleConverter {
    fn to_modern(&self, origin: &str, text: &str) -> Result<String, RuleFormatError> {
        rewrite_lines(text, |line_no, raw| Self::line_to_modern(origin, line_no, raw))
    }

    fn to_legacy(&self, origin: &str, text: &str) -> Result<String, RuleFormatError> {
        rewrite_lines(text, |line_no, raw| Self::line_to_legacy(origin, line_no, raw))
    }
}
