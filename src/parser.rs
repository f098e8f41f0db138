use log::debug;

/// Parser for JSDoc comment blocks (`/** ... */`).
///
/// The `CommentParser` finds every documentation block in a piece of text and splits it into a
/// free-text description followed by `@tag` entries. Each tag line has the shape
///
/// ```text
/// @tag {type} name description
/// @tag {type} [name=default] description
/// ```
///
/// where every part after the tag name is optional. Lines following a tag line belong to that
/// tag's description until the next tag. Indentation beyond the single space after the leading
/// `*` is preserved, which keeps YAML embedded in an `@openapi` tag intact.
///
/// # Example
///
/// ```
/// use openapi_from_fragments::parser::CommentParser;
///
/// let blocks = CommentParser::parse("/**\n * A user\n * @typedef {Object} User\n */");
/// assert_eq!(blocks[0].description, "A user");
/// assert_eq!(blocks[0].tags[0].name, "User");
/// ```
pub struct CommentParser;

/// A single parsed documentation block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentBlock {
    /// The raw block text including the `/**` and `*/` markers
    pub source: String,
    /// Free text before the first tag
    pub description: String,
    /// Tags in source order
    pub tags: Vec<Tag>,
    /// Syntax problems found anywhere in the block
    pub problems: Vec<Problem>,
}

/// One `@tag` entry of a block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag {
    /// Tag name without the `@`
    pub tag: String,
    /// Contents of the `{...}` group, empty when absent
    pub type_expr: String,
    /// The name token, without brackets and default
    pub name: String,
    /// Whether the name was written as `[name]`
    pub optional: bool,
    /// The text after `=` in `[name=default]`
    pub default: Option<String>,
    pub description: String,
}

/// A syntax problem in a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Stable identifier such as `spec:type:unpaired-curly`
    pub code: &'static str,
    pub message: String,
    /// Zero-based line within the block
    pub line: usize,
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} (line {}): {}", self.code, self.line, self.message)
    }
}

impl CommentBlock {
    /// Returns the first tag with the given name.
    pub fn find_tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.tag == name)
    }
}

impl CommentParser {
    /// Returns the raw text of every `/** ... */` block in `text`.
    ///
    /// An unterminated block at the end of the text is ignored.
    pub fn blocks(text: &str) -> Vec<&str> {
        let mut blocks = Vec::new();
        let mut rest = text;
        let mut consumed = 0;
        while let Some(start) = rest.find("/**") {
            let body_start = start + 3;
            match rest[body_start..].find("*/") {
                Some(end) => {
                    let block_end = body_start + end + 2;
                    blocks.push(&text[consumed + start..consumed + block_end]);
                    consumed += block_end;
                    rest = &rest[block_end..];
                }
                None => break,
            }
        }
        blocks
    }

    /// Parses every documentation block in `text`.
    pub fn parse(text: &str) -> Vec<CommentBlock> {
        let blocks: Vec<CommentBlock> = Self::blocks(text)
            .into_iter()
            .map(Self::parse_block)
            .collect();
        debug!("Found {} comment blocks", blocks.len());
        blocks
    }

    /// Parses a single block, given with its `/**` and `*/` markers.
    pub fn parse_block(block: &str) -> CommentBlock {
        let inner = block
            .strip_prefix("/**")
            .and_then(|b| b.strip_suffix("*/"))
            .unwrap_or(block);

        let mut parsed = CommentBlock {
            source: block.to_string(),
            ..Default::default()
        };
        let mut description: Vec<&str> = Vec::new();
        let mut tag_lines: Vec<(usize, Vec<&str>)> = Vec::new();

        for (line_no, raw) in inner.lines().enumerate() {
            let content = strip_delimiter(raw);
            if content.trim_start().starts_with('@') {
                tag_lines.push((line_no, vec![content.trim_start()]));
            } else if let Some((_, lines)) = tag_lines.last_mut() {
                lines.push(content);
            } else {
                description.push(content);
            }
        }

        parsed.description = join_lines(&description).trim().to_string();
        for (line_no, lines) in tag_lines {
            let tag = parse_tag(&lines, line_no, &mut parsed.problems);
            parsed.tags.push(tag);
        }
        parsed
    }
}

/// Drops leading whitespace, the `*` delimiter and one space after it.
fn strip_delimiter(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix('*') {
        Some(after) => after
            .strip_prefix(' ')
            .or_else(|| after.strip_prefix('\t'))
            .unwrap_or(after)
            .trim_end(),
        None => trimmed.trim_end(),
    }
}

/// Joins lines, dropping leading and trailing blank ones.
fn join_lines(lines: &[&str]) -> String {
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

/// Byte index of the bracket closing the one at the start of `text`.
fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Reads a `{...}` group that may continue over the following lines.
///
/// Returns the group contents, the text after the closing brace on its line
/// and the number of continuation lines consumed.
fn type_group<'a>(first: &'a str, more: &[&'a str]) -> Option<(String, &'a str, usize)> {
    let mut depth = 0usize;
    let mut collected = String::new();
    for (line, segment) in std::iter::once(first).chain(more.iter().copied()).enumerate() {
        for (i, c) in segment.char_indices() {
            if c == '{' {
                depth += 1;
            } else if c == '}' {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    collected.push_str(&segment[..i]);
                    let inner = collected.strip_prefix('{').unwrap_or(&collected);
                    return Some((inner.trim().to_string(), &segment[i + 1..], line));
                }
            }
        }
        collected.push_str(segment);
        collected.push('\n');
    }
    None
}

fn parse_tag(lines: &[&str], line_no: usize, problems: &mut Vec<Problem>) -> Tag {
    let first = lines[0].strip_prefix('@').unwrap_or(lines[0]);
    let tag_end = first
        .find(|c: char| c.is_whitespace() || c == '{')
        .unwrap_or(first.len());
    let mut tag = Tag {
        tag: first[..tag_end].to_string(),
        ..Default::default()
    };
    let mut rest = first[tag_end..].trim_start();
    let mut continuation = &lines[1..];

    if rest.starts_with('{') {
        match type_group(rest, continuation) {
            Some((type_expr, after, consumed)) => {
                tag.type_expr = type_expr;
                rest = after.trim_start();
                continuation = &continuation[consumed..];
            }
            None => {
                problems.push(Problem {
                    code: "spec:type:unpaired-curly",
                    message: format!("tag @{} has an unpaired curly bracket", tag.tag),
                    line: line_no,
                });
                return tag;
            }
        }
    }

    if rest.starts_with('[') {
        match matching_close(rest, '[', ']') {
            Some(end) => {
                let inner = &rest[1..end];
                rest = rest[end + 1..].trim_start();
                tag.optional = true;
                match inner.split_once('=') {
                    Some((name, default)) => {
                        tag.name = name.trim().to_string();
                        let default = default.trim();
                        if default.is_empty() {
                            problems.push(Problem {
                                code: "spec:name:empty-default",
                                message: format!("tag @{} has an empty default value", tag.tag),
                                line: line_no,
                            });
                        } else {
                            tag.default = Some(default.to_string());
                        }
                    }
                    None => tag.name = inner.trim().to_string(),
                }
                if tag.name.is_empty() {
                    problems.push(Problem {
                        code: "spec:name:empty-name",
                        message: format!("tag @{} has an empty name", tag.tag),
                        line: line_no,
                    });
                }
            }
            None => {
                problems.push(Problem {
                    code: "spec:name:unpaired-brackets",
                    message: format!("tag @{} has an unpaired square bracket", tag.tag),
                    line: line_no,
                });
                return tag;
            }
        }
    } else {
        let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tag.name = rest[..name_end].to_string();
        rest = rest[name_end..].trim_start();
    }

    let mut description = vec![rest];
    description.extend_from_slice(continuation);
    tag.description = join_lines(&description).trim_end().to_string();
    tag
}
