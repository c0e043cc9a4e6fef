//! Line-oriented `key=value` text builder.

use std::fmt::Display;

/// Accumulates sections of directive lines.
///
/// Sections are separated by exactly one blank line; sections that end up
/// empty contribute nothing.
#[derive(Debug, Default)]
pub struct DirectiveWriter {
    sections: Vec<Vec<String>>,
}

impl DirectiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new section.
    pub fn section(&mut self) -> &mut Self {
        self.sections.push(Vec::new());
        self
    }

    fn push(&mut self, line: String) -> &mut Self {
        if let Some(section) = self.sections.last_mut() {
            section.push(line);
        } else {
            self.sections.push(vec![line]);
        }
        self
    }

    /// Bare directive.
    pub fn directive(&mut self, name: &str) -> &mut Self {
        self.push(name.to_owned())
    }

    /// Bare directive, only when `enabled`.
    pub fn directive_if(&mut self, enabled: bool, name: &str) -> &mut Self {
        if enabled {
            self.directive(name);
        }
        self
    }

    /// `key=value`.
    pub fn pair(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.push(format!("{key}={value}"))
    }

    /// `key=value`, only when `enabled`.
    pub fn pair_if(&mut self, enabled: bool, key: &str, value: impl Display) -> &mut Self {
        if enabled {
            self.pair(key, value);
        }
        self
    }

    /// `key=value` when set; nothing when `None`.
    pub fn optional<T: Display>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.pair(key, value);
        }
        self
    }

    /// Join sections with a blank line and end with a newline.
    pub fn finish(self) -> String {
        let mut output = self
            .sections
            .into_iter()
            .filter(|section| !section.is_empty())
            .map(|section| section.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n");
        output.push('\n');
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_are_dropped() {
        let mut writer = DirectiveWriter::new();
        writer.section().pair("network", "bitcoin");
        writer.section().directive_if(false, "large-channels");
        writer
            .section()
            .optional("htlc-maximum-msat", Some(0_u64))
            .optional::<u64>("htlc-minimum-msat", None);
        assert_eq!(writer.finish(), "network=bitcoin\n\nhtlc-maximum-msat=0\n");
    }
}
