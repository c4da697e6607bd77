use unicode_width::UnicodeWidthStr;

pub struct TextMetrics {
    pub char_width: f64,
    pub line_height: f64,
    pub font_size: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 16.0,
            font_size: 13.0,
        }
    }
}

impl TextMetrics {
    pub fn text_width(&self, text: &str) -> f64 {
        let width = UnicodeWidthStr::width(text);
        width as f64 * self.char_width
    }

    /// Word-wrap a label so every line fits `max_width` pixels. Words longer
    /// than a full line stay on their own line unbroken.
    pub fn wrap_label(&self, text: &str, max_width: f64) -> Vec<String> {
        let mut lines = Vec::new();
        let mut line = String::new();

        for word in text.split_whitespace() {
            let candidate_width = if line.is_empty() {
                self.text_width(word)
            } else {
                self.text_width(&line) + self.char_width + self.text_width(word)
            };

            if candidate_width <= max_width || line.is_empty() {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut line));
                line.push_str(word);
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }

        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_width() {
        let m = TextMetrics::default();
        assert_eq!(m.text_width("Ship"), 4.0 * 8.0);
    }

    #[test]
    fn test_unicode_width() {
        let m = TextMetrics::default();
        // Fullwidth characters count double
        assert_eq!(m.text_width("承認"), 4.0 * 8.0);
    }

    #[test]
    fn test_wrap_short_label() {
        let m = TextMetrics::default();
        assert_eq!(m.wrap_label("Approve order", 200.0), vec!["Approve order"]);
    }

    #[test]
    fn test_wrap_long_label() {
        let m = TextMetrics::default();
        let lines = m.wrap_label("Check customer credit and shipping address", 120.0);
        assert!(lines.len() > 1);
        for line in &lines {
            // A single word may exceed the limit; joined words may not.
            if line.contains(' ') {
                assert!(m.text_width(line) <= 120.0);
            }
        }
    }

    #[test]
    fn test_wrap_empty_label() {
        let m = TextMetrics::default();
        assert_eq!(m.wrap_label("", 100.0), vec![String::new()]);
    }
}
