use super::{Dialect, EncodingState};

// Box drawing glyphs, as printed by `tree`.
const BOX_LEVEL: &str = "│\u{a0}\u{a0} ";
const BOX_LEVEL_LAST: &str = "    ";
const BOX_ITEM: &str = "├── ";
const BOX_ITEM_LAST: &str = "└── ";

/// The dialect of the Unix `tree` command.
///
/// Depth is taken from the width of the glyph prefix only, so names containing
/// spaces or box drawing characters decode as they are. Both regular and
/// no-break spaces are accepted in the prefix.
#[derive(Debug, Default, Copy, Clone)]
pub struct Unix {
    summary: bool,
}

impl Unix {
    /// Enables the `"N directories, M files"` summary after the tree.
    pub fn with_summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }
}

fn plural(n: usize, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}

/// Parses `"<n> director(y|ies), <m> file(s)"`.
fn is_summary(line: &str) -> bool {
    fn counted<'a>(part: &'a str, one: &str, many: &str) -> bool {
        let Some((count, noun)) = part.trim().split_once(' ') else {
            return false;
        };
        !count.is_empty()
            && count.bytes().all(|b| b.is_ascii_digit())
            && (noun == one || noun == many)
    }
    match line.split_once(',') {
        Some((dirs, files)) => {
            counted(dirs, "directory", "directories") && counted(files, "file", "files")
        }
        None => false,
    }
}

impl Dialect for Unix {
    fn decode_line<'a>(&self, line: &'a str) -> Option<(usize, &'a str)> {
        let pos = line.find(['├', '└'])?;
        let prefix = &line[..pos];
        if !prefix.chars().all(|c| matches!(c, '│' | ' ' | '\u{a0}')) {
            return None;
        }
        let depth = prefix.chars().count() / 4;

        let rest = line[pos..]
            .trim_start_matches(['├', '└'])
            .trim_start_matches('─');
        let name = rest.strip_prefix([' ', '\u{a0}'])?;
        if name.is_empty() {
            return None;
        }
        Some((depth, name))
    }

    fn encode_state(&self, state: EncodingState) -> &'static str {
        match state {
            EncodingState::Level => BOX_LEVEL,
            EncodingState::LevelLast => BOX_LEVEL_LAST,
            EncodingState::Item => BOX_ITEM,
            EncodingState::ItemLast => BOX_ITEM_LAST,
        }
    }

    fn is_trailer(&self, line: &str) -> bool {
        is_summary(line)
    }

    fn trailer(&self, dirs: usize, files: usize) -> Option<String> {
        self.summary.then(|| {
            format!(
                "\n{} {}, {} {}\n",
                dirs,
                plural(dirs, "directory", "directories"),
                files,
                plural(files, "file", "files"),
            )
        })
    }
}

/// Tab-indented dialect: one tab character per level, no glyphs.
#[derive(Debug, Default, Copy, Clone)]
pub struct Tab;

impl Dialect for Tab {
    fn decode_line<'a>(&self, line: &'a str) -> Option<(usize, &'a str)> {
        let depth = line.bytes().take_while(|&b| b == b'\t').count();
        let name = &line[depth..];
        if name.is_empty() {
            return None;
        }
        Some((depth, name))
    }

    fn encode_state(&self, _state: EncodingState) -> &'static str {
        "\t"
    }
}
