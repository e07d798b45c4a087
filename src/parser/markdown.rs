//! Sectional markdown parser
//!
//! One chunk per section: a section starts at an ATX heading and extends
//! until the next heading of equal or shallower level, or EOF. The chunk
//! `path` is the full heading trail joined with ` > `; duplicate sibling
//! headings get ` (2)`, ` (3)` suffixes. Content before the first heading
//! becomes an anonymous preamble chunk when non-empty.

use super::Chunk;
use crate::workspace::FileRole;

struct Heading {
    line: usize,
    level: usize,
    text: String,
}

pub(crate) fn parse(file: &str, role: FileRole, source: &str, parsed_at: i64) -> Vec<Chunk> {
    // (start, end) byte offsets of each line's content, terminator excluded
    let mut line_spans: Vec<(usize, usize)> = Vec::new();
    let mut pos = 0;
    for line in source.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        let content = content.strip_suffix('\r').unwrap_or(content);
        line_spans.push((pos, pos + content.len()));
        pos += line.len();
    }

    if line_spans.is_empty() {
        return Vec::new();
    }

    let headings = scan_headings(source, &line_spans);

    let slice = |first: usize, last: usize| -> (String, (u32, u32, u32, u32)) {
        let start = line_spans[first].0;
        let end = line_spans[last].1;
        let text = source[start..end].to_string();
        let end_col = (line_spans[last].1 - line_spans[last].0).max(1) as u32;
        (text, (first as u32 + 1, 1, last as u32 + 1, end_col))
    };

    let mut chunks = Vec::new();

    // preamble before the first heading, or the whole file without headings
    let preamble_end = headings
        .first()
        .map(|h| h.line)
        .unwrap_or(line_spans.len());
    if preamble_end > 0 {
        let (text, span) = slice(0, preamble_end - 1);
        if !text.trim().is_empty() {
            chunks.push(Chunk::new(
                file,
                role,
                String::new(),
                "preamble".to_string(),
                text,
                span,
                parsed_at,
            ));
        }
    }

    // heading stack carries disambiguated segment texts for the trail
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut sibling_counts: std::collections::HashMap<(String, String), usize> =
        std::collections::HashMap::new();

    for (i, heading) in headings.iter().enumerate() {
        let end_line = headings[i + 1..]
            .iter()
            .find(|next| next.level <= heading.level)
            .map(|next| next.line - 1)
            .unwrap_or(line_spans.len() - 1);

        while stack.last().is_some_and(|(level, _)| *level >= heading.level) {
            stack.pop();
        }

        let parent_trail = stack
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join(" > ");

        let occurrence = sibling_counts
            .entry((parent_trail.clone(), heading.text.clone()))
            .and_modify(|n| *n += 1)
            .or_insert(1);
        let segment = if *occurrence == 1 {
            heading.text.clone()
        } else {
            format!("{} ({})", heading.text, occurrence)
        };

        let trail = if parent_trail.is_empty() {
            segment.clone()
        } else {
            format!("{parent_trail} > {segment}")
        };
        stack.push((heading.level, segment));

        let (text, span) = slice(heading.line, end_line);
        let summary = format!("section `{} {}`", "#".repeat(heading.level), heading.text);
        chunks.push(Chunk::new(file, role, trail, summary, text, span, parsed_at));
    }

    chunks
}

/// Find ATX headings, skipping fenced code blocks
fn scan_headings(source: &str, line_spans: &[(usize, usize)]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut fence: Option<(char, usize)> = None;

    for (i, &(start, end)) in line_spans.iter().enumerate() {
        let line = &source[start..end];

        if let Some((fence_char, fence_len)) = fence {
            let trimmed = line.trim_start();
            let run = trimmed.chars().take_while(|c| *c == fence_char).count();
            if run >= fence_len && trimmed[run..].trim().is_empty() {
                fence = None;
            }
            continue;
        }

        let trimmed = line.trim_start();
        for fence_char in ['`', '~'] {
            let run = trimmed.chars().take_while(|c| *c == fence_char).count();
            if run >= 3 {
                fence = Some((fence_char, run));
                break;
            }
        }
        if fence.is_some() {
            continue;
        }

        if let Some(heading) = parse_atx(line, i) {
            headings.push(heading);
        }
    }

    headings
}

fn parse_atx(line: &str, line_idx: usize) -> Option<Heading> {
    if !line.starts_with('#') {
        return None;
    }
    let level = line.chars().take_while(|c| *c == '#').count();
    if level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }

    let mut text = rest.trim();
    // optional closing hash sequence: "## Title ##"
    let without_close = text.trim_end_matches('#');
    if without_close.len() < text.len()
        && (without_close.is_empty()
            || without_close.ends_with(' ')
            || without_close.ends_with('\t'))
    {
        text = without_close.trim_end();
    }

    Some(Heading {
        line: line_idx,
        level,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_md(source: &str) -> Vec<Chunk> {
        parse("MEMORY.md", FileRole::Memory, source, 100)
    }

    #[test]
    fn test_single_section() {
        let chunks = parse_md("## Authentication\n\nWe use JWT tokens.\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path, "Authentication");
        assert_eq!(chunks[0].summary, "section `## Authentication`");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].role, FileRole::Memory);
    }

    #[test]
    fn test_heading_trail() {
        let source = "# Guide\n\nintro\n\n## Setup\n\nsteps\n\n### Linux\n\napt install\n";
        let chunks = parse_md(source);
        let trails: Vec<&str> = chunks.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(trails, vec!["Guide", "Guide > Setup", "Guide > Setup > Linux"]);
    }

    #[test]
    fn test_section_extends_to_equal_or_shallower_heading() {
        let source = "## A\n\na body\n\n### A child\n\nchild body\n\n## B\n\nb body\n";
        let chunks = parse_md(source);

        // outer section A spans through its nested child
        let a = chunks.iter().find(|c| c.path == "A").unwrap();
        assert!(a.source.contains("child body"));
        assert!(!a.source.contains("b body"));

        // the child has its own tighter span
        let child = chunks.iter().find(|c| c.path == "A > A child").unwrap();
        assert_eq!(child.start_line, 5);
    }

    #[test]
    fn test_preamble_chunk() {
        let source = "Some intro text.\n\n# First\n\nbody\n";
        let chunks = parse_md(source);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].path, "");
        assert_eq!(chunks[0].summary, "preamble");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn test_blank_preamble_skipped() {
        let chunks = parse_md("\n\n# Only\n\nbody\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path, "Only");
    }

    #[test]
    fn test_no_headings_yields_single_anonymous_chunk() {
        let chunks = parse_md("just prose\nwithout structure\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path, "");
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn test_duplicate_siblings_suffixed() {
        let source = "## Notes\n\nfirst\n\n## Notes\n\nsecond\n\n## Notes\n\nthird\n";
        let chunks = parse_md(source);
        let trails: Vec<&str> = chunks.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(trails, vec!["Notes", "Notes (2)", "Notes (3)"]);
    }

    #[test]
    fn test_duplicate_parent_disambiguates_children() {
        let source = "## Week\n\n### Summary\n\na\n\n## Week\n\n### Summary\n\nb\n";
        let chunks = parse_md(source);
        let trails: Vec<&str> = chunks.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            trails,
            vec![
                "Week",
                "Week > Summary",
                "Week (2)",
                "Week (2) > Summary",
            ]
        );
    }

    #[test]
    fn test_fenced_code_headings_ignored() {
        let source = "## Real\n\n```sh\n# not a heading\n```\n\nmore\n";
        let chunks = parse_md(source);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path, "Real");
        assert!(chunks[0].source.contains("# not a heading"));
    }

    #[test]
    fn test_closing_hashes_stripped() {
        let chunks = parse_md("## Title ##\n\nbody\n");
        assert_eq!(chunks[0].path, "Title");
        assert_eq!(chunks[0].summary, "section `## Title`");
    }

    #[test]
    fn test_empty_file() {
        assert!(parse_md("").is_empty());
    }

    #[test]
    fn test_crlf_lines() {
        let chunks = parse_md("## One\r\n\r\nbody\r\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path, "One");
        assert!(!chunks[0].source.contains('\r') || chunks[0].source.ends_with("body"));
    }
}
