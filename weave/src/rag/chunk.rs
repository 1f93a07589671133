//! Chunking: code-aware, markdown, and plain-text strategies producing
//! `DocumentChunk`s with stable line ranges.
//!
//! Markdown splits on headings, code and plain text on blank lines.
//! Regions over the byte cap are bisected until they fit; regions under
//! the minimum size are merged into their neighbor within the same file,
//! so single-line fragments don't pollute retrieval.

use serde::{Deserialize, Serialize};

const MAX_CHUNK_BYTES: usize = 4000;
const MIN_CHUNK_BYTES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkType {
    CodeBlock,
    MarkdownSection,
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub repository: String,
    pub chunk_type: ChunkType,
    pub language: Option<String>,
    pub function_name: Option<String>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub start_line: usize,
    pub end_line: usize,
}

const CODE_SUFFIXES: &[&str] =
    &[".rs", ".ts", ".tsx", ".js", ".jsx", ".py", ".go", ".java", ".c", ".cpp", ".h", ".rb"];

fn strategy_for(relative_path: &str) -> ChunkType {
    if relative_path.ends_with(".md") || relative_path.ends_with(".markdown") {
        ChunkType::MarkdownSection
    } else if CODE_SUFFIXES.iter().any(|s| relative_path.ends_with(s)) {
        ChunkType::CodeBlock
    } else {
        ChunkType::PlainText
    }
}

fn file_name(relative_path: &str) -> String {
    relative_path.rsplit('/').next().unwrap_or(relative_path).to_string()
}

fn extension(relative_path: &str) -> String {
    relative_path.rsplit('.').next().unwrap_or("").to_string()
}

/// Splits `contents` into raw line-range regions by strategy, then applies
/// the shared size-cap split / minimum-size merge pass.
pub fn chunk_file(relative_path: &str, repository: &str, contents: &str) -> Vec<DocumentChunk> {
    let chunk_type = strategy_for(relative_path);
    let lines: Vec<&str> = contents.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let raw_regions = match chunk_type {
        ChunkType::MarkdownSection => split_on_headings(&lines),
        ChunkType::CodeBlock | ChunkType::PlainText => split_on_blank_lines(&lines),
    };

    let capped = raw_regions.into_iter().flat_map(|r| split_if_oversized(&lines, r)).collect::<Vec<_>>();
    let merged = merge_undersized(&lines, capped);

    merged
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| {
            let content = lines[start..=end].join("\n");
            DocumentChunk {
                id: format!("{repository}:{relative_path}:{i}"),
                content,
                metadata: DocumentMetadata {
                    file_path: relative_path.to_string(),
                    file_name: file_name(relative_path),
                    file_type: extension(relative_path),
                    repository: repository.to_string(),
                    chunk_type,
                    language: matches!(chunk_type, ChunkType::CodeBlock).then(|| extension(relative_path)),
                    function_name: None,
                    class_name: None,
                },
                start_line: start + 1,
                end_line: end + 1,
            }
        })
        .collect()
}

type Region = (usize, usize);

fn split_on_blank_lines(lines: &[&str]) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut start = None;
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                regions.push((s, i - 1));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        regions.push((s, lines.len() - 1));
    }
    if regions.is_empty() {
        regions.push((0, lines.len() - 1));
    }
    regions
}

fn split_on_headings(lines: &[&str]) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut start = 0;
    for (i, line) in lines.iter().enumerate().skip(1) {
        if line.starts_with('#') {
            regions.push((start, i - 1));
            start = i;
        }
    }
    regions.push((start, lines.len() - 1));
    regions
}

fn split_if_oversized(lines: &[&str], region: Region) -> Vec<Region> {
    let (start, end) = region;
    let byte_len: usize = lines[start..=end].iter().map(|l| l.len() + 1).sum();
    if byte_len <= MAX_CHUNK_BYTES || end == start {
        return vec![region];
    }
    let mid = start + (end - start) / 2;
    let mut out = split_if_oversized(lines, (start, mid));
    out.extend(split_if_oversized(lines, (mid + 1, end)));
    out
}

fn merge_undersized(lines: &[&str], regions: Vec<Region>) -> Vec<Region> {
    let mut merged: Vec<Region> = Vec::new();
    for region in regions {
        let byte_len: usize = lines[region.0..=region.1].iter().map(|l| l.len() + 1).sum();
        if byte_len < MIN_CHUNK_BYTES {
            if let Some(last) = merged.last_mut() {
                last.1 = region.1;
                continue;
            }
        }
        merged.push(region);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_single_chunk_has_stable_line_range() {
        let contents = "# Title\n\nHello world";
        let chunks = chunk_file("README.md", "acme/widget", contents);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].metadata.chunk_type, ChunkType::MarkdownSection);
    }

    #[test]
    fn code_file_splits_on_blank_lines_when_blocks_are_large_enough() {
        let block_a = format!("fn a() {{ let _ = \"{}\"; }}", "a".repeat(250));
        let block_b = format!("fn b() {{ let _ = \"{}\"; }}", "b".repeat(250));
        let contents = format!("{block_a}\n\n{block_b}\n");
        let chunks = chunk_file("src/lib.rs", "acme/widget", &contents);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, block_a);
        assert_eq!(chunks[1].content, block_b);
        assert_eq!(chunks[0].metadata.language.as_deref(), Some("rs"));
    }

    #[test]
    fn undersized_adjacent_blocks_merge_into_one_chunk() {
        let contents = "fn a() {}\n\nfn b() {}\n";
        let chunks = chunk_file("src/lib.rs", "acme/widget", contents);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
    }

    #[test]
    fn chunk_serialization_round_trips() {
        let chunks = chunk_file("README.md", "acme/widget", "# T\n\nbody");
        let json = serde_json::to_string(&chunks[0]).unwrap();
        let back: DocumentChunk = serde_json::from_str(&json).unwrap();
        assert_eq!(chunks[0], back);
    }

    #[test]
    fn oversized_region_is_split_below_the_byte_cap() {
        let big_line = "x".repeat(100);
        let contents = std::iter::repeat(big_line).take(100).collect::<Vec<_>>().join("\n");
        let chunks = chunk_file("src/big.rs", "acme/widget", &contents);
        assert!(chunks.len() > 1);
    }
}
