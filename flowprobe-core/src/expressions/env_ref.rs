/// Returns the variable name when the whole value is a `${NAME}` indirection.
///
/// Only one level is recognised; the resolved value is never parsed again.
pub fn env_reference(value: &str) -> Option<&str> {
    let inner = value.trim().strip_prefix("${")?.strip_suffix('}')?;
    let inner = inner.trim();
    if inner.is_empty() || inner.contains(['{', '}', '$']) {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_whole_value_reference() {
        assert_eq!(env_reference("${API_TOKEN}"), Some("API_TOKEN"));
        assert_eq!(env_reference("  ${ API_TOKEN }  "), Some("API_TOKEN"));
    }

    #[test]
    fn ignores_literals_and_partial_references() {
        assert_eq!(env_reference("plain-token"), None);
        assert_eq!(env_reference("Bearer ${TOKEN}"), None);
        assert_eq!(env_reference("${}"), None);
        assert_eq!(env_reference("${${NESTED}}"), None);
    }
}
