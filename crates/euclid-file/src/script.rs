//! 命题脚本（JSON）
//!
//! 单个命题是一个 JSON 对象，命题目录是命题对象的数组。
//! 目录中的命题按编号注册为宏，排在内置命题之后，编号相同时覆盖内置命题。

use crate::error::FileError;
use euclid_core::macros::MacroRegistry;
use euclid_core::script::Proposition;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// 解析单个命题
pub fn parse_proposition(text: &str) -> Result<Proposition, FileError> {
    Ok(serde_json::from_str(text)?)
}

/// 解析命题目录，编号不得重复
pub fn parse_catalog(text: &str) -> Result<Vec<Proposition>, FileError> {
    let catalog: Vec<Proposition> = serde_json::from_str(text)?;
    check_unique(&catalog)?;
    Ok(catalog)
}

fn check_unique(catalog: &[Proposition]) -> Result<(), FileError> {
    let mut seen = BTreeSet::new();
    for proposition in catalog {
        if !seen.insert(proposition.number) {
            return Err(FileError::InvalidFormat(format!(
                "Proposition I.{} appears more than once in catalog",
                proposition.number
            )));
        }
    }
    Ok(())
}

pub fn load_proposition(path: &Path) -> Result<Proposition, FileError> {
    let reader = BufReader::new(File::open(path)?);
    let proposition: Proposition = serde_json::from_reader(reader)?;

    tracing::info!(
        "Loaded I.{} ({} steps) from {}",
        proposition.number,
        proposition.steps.len(),
        path.display()
    );
    Ok(proposition)
}

pub fn save_proposition(proposition: &Proposition, path: &Path) -> Result<(), FileError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, proposition)?;
    writer.flush()?;

    tracing::info!("Saved I.{} to {}", proposition.number, path.display());
    Ok(())
}

pub fn load_catalog(path: &Path) -> Result<Vec<Proposition>, FileError> {
    let reader = BufReader::new(File::open(path)?);
    let catalog: Vec<Proposition> = serde_json::from_reader(reader)?;
    check_unique(&catalog)?;

    tracing::info!("Loaded {} propositions from {}", catalog.len(), path.display());
    Ok(catalog)
}

pub fn save_catalog(catalog: &[Proposition], path: &Path) -> Result<(), FileError> {
    check_unique(catalog)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, catalog)?;
    writer.flush()?;

    tracing::info!("Saved {} propositions to {}", catalog.len(), path.display());
    Ok(())
}

/// 内置命题加上目录中的命题
///
/// 目录按编号升序注册，每个脚本只能调用编号更小的命题。
pub fn load_registry(catalog: &[Proposition]) -> Result<MacroRegistry, FileError> {
    let mut registry = MacroRegistry::with_builtins();
    let mut ordered: Vec<&Proposition> = catalog.iter().collect();
    ordered.sort_by_key(|p| p.number);
    for proposition in ordered {
        if registry
            .register_script(proposition.clone())?
            .is_some()
        {
            tracing::debug!("I.{} overrides a built-in macro", proposition.number);
        }
    }
    Ok(registry)
}
