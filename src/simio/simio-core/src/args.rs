/// Cursor over the argument tail of a command
///
/// Tokens are separated by whitespace; a double-quoted token may contain
/// spaces and is returned without its quotes.
#[derive(Clone, Debug)]
pub struct ArgTokens<'a> {
    text: &'a str,
}

impl<'a> ArgTokens<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Take the next token, `None` once the tail is exhausted
    pub fn next_arg(&mut self) -> Option<&'a str> {
        let text = self.text.trim_start();
        if text.is_empty() {
            self.text = text;
            return None;
        }

        if let Some(quoted) = text.strip_prefix('"') {
            // Unterminated quote runs to the end of the line
            let end = quoted.find('"').unwrap_or(quoted.len());
            self.text = quoted.get(end + 1..).unwrap_or("");
            return Some(&quoted[..end]);
        }

        let end = text.find(char::is_whitespace).unwrap_or(text.len());
        self.text = &text[end..];
        Some(&text[..end])
    }

    /// Remaining, unconsumed text
    pub fn rest(&self) -> &'a str {
        self.text.trim()
    }

    pub fn is_empty(&self) -> bool {
        self.rest().is_empty()
    }
}

impl<'a> Iterator for ArgTokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.next_arg()
    }
}

#[cfg(test)]
mod args_tests {
    use super::*;

    #[test]
    fn test_split_whitespace() {
        let mut args = ArgTokens::new("  rx   0x6e\tfoo ");
        assert_eq!(args.next_arg(), Some("rx"));
        assert_eq!(args.rest(), "0x6e\tfoo");
        assert_eq!(args.next_arg(), Some("0x6e"));
        assert_eq!(args.next_arg(), Some("foo"));
        assert_eq!(args.next_arg(), None);
        assert!(args.is_empty());
    }

    #[test]
    fn test_quoted_tokens() {
        let args: Vec<&str> = ArgTokens::new(r#"endpoint "ipc:///tmp/a b.sock" x"#).collect();
        assert_eq!(args, vec!["endpoint", "ipc:///tmp/a b.sock", "x"]);

        let mut args = ArgTokens::new(r#""unterminated tail"#);
        assert_eq!(args.next_arg(), Some("unterminated tail"));
        assert_eq!(args.next_arg(), None);
    }
}
