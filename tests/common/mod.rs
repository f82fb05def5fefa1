//! Shared fixtures for integration tests

use std::fs;
use std::path::{Path, PathBuf};
use symdex::{
    ExtractError, ExtractedFile, ExportInfo, ImportInfo, Location, Range, Symbol, SymbolExtractor,
    SymbolKind,
};
use tempfile::TempDir;

/// Deterministic extractor for synthetic fixtures.
///
/// One symbol per non-empty line, qualified as `{stem}.Symbol{i}`. Lines
/// starting with `import ` become imports instead, lines starting with
/// `export ` mark their symbol exported, and a file containing `@@broken@@`
/// fails extraction outright.
pub struct FixtureExtractor;

impl SymbolExtractor for FixtureExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<ExtractedFile, ExtractError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ExtractError::InvalidUtf8)?;
        if text.contains("@@broken@@") {
            return Err(ExtractError::Syntax {
                line: 1,
                reason: "fixture marked broken".to_string(),
            });
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ExtractError::Unsupported {
                path: path.to_path_buf(),
            })?;

        let mut extracted = ExtractedFile::default();
        let mut index = 0usize;
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(module) = line.strip_prefix("import ") {
                extracted.imports.push(ImportInfo::new(module.trim()));
                continue;
            }

            let name = format!("Symbol{index}");
            let mut symbol = Symbol::new(
                name.clone(),
                format!("{stem}.Symbol{index}"),
                SymbolKind::Function,
                Location::new(
                    path,
                    Range::new(line_no as u32 + 1, 0, line_no as u32 + 1, line.len() as u16),
                ),
            )
            .with_parameters(vec!["input: string".into()])
            .with_return_type("void");

            if line.starts_with("export ") {
                symbol = symbol.exported();
                extracted.exports.push(ExportInfo::new(name));
            }
            extracted.symbols.push(symbol);
            index += 1;
        }

        Ok(extracted)
    }
}

/// Write a fixture source file with `symbols` exported function lines.
pub fn write_fixture(dir: &Path, name: &str, symbols: usize) -> PathBuf {
    let content: String = (0..symbols)
        .map(|i| format!("export function fn{i}(input: string): void {{}}\n"))
        .collect();
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Temp workspace with `count` fixture files of `symbols` symbols each.
pub fn fixture_workspace(count: usize, symbols: usize) -> (TempDir, Vec<PathBuf>) {
    let temp = TempDir::new().unwrap();
    let files = (0..count)
        .map(|i| write_fixture(temp.path(), &format!("file{i}.ts"), symbols))
        .collect();
    (temp, files)
}
