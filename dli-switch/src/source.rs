//! Local script files: strip `#` comments and whitespace from each line.

use std::path::Path;

use anyhow::Context;

/// Clean every line of a script source. Interior blank lines are kept so line numbers
/// (and `GOTO` targets) match the file; trailing blank lines are dropped.
pub fn clean(source: &str) -> Vec<String> {
    let mut lines: Vec<String> = source.lines().map(clean_line).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn clean_line(line: &str) -> String {
    let code = match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    };
    code.trim().to_string()
}

pub fn load(path: &Path) -> anyhow::Result<Vec<String>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    Ok(clean(&source))
}
