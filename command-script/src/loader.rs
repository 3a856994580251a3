//! # Loader 模块
//!
//! 按路径加载脚本并缓存解析结果。
//!
//! ## 设计说明
//!
//! - 缓存是显式注入的对象而不是全局状态，多个加载器可以共享同一个 [`AstCache`]
//! - 键为规范化后的绝对路径；首次访问解析并写入，之后只读
//! - 并发时两个线程可能同时解析同一文件：解析是幂等的，写入时先到者胜出

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::ScriptConfig;
use crate::error::{LoadError, ScriptResult};
use crate::script::ParsedScript;
use crate::script::command::CommandCatalog;
use crate::script::parser::Parser;

/// 路径到解析结果的缓存
#[derive(Debug, Default)]
pub struct AstCache {
    entries: RwLock<HashMap<PathBuf, Arc<ParsedScript>>>,
}

impl AstCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<ParsedScript>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(path).cloned()
    }

    /// 写入一次：已有条目时保留旧值并返回它
    pub fn insert_once(&self, path: PathBuf, script: Arc<ParsedScript>) -> Arc<ParsedScript> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(path).or_insert(script))
    }

    pub fn contains(&self, path: &Path) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 脚本加载器
pub struct AstLoader {
    cache: Arc<AstCache>,
    config: ScriptConfig,
    catalog: Box<dyn CommandCatalog + Send + Sync>,
}

impl AstLoader {
    /// 使用独立缓存创建加载器
    pub fn new(config: ScriptConfig) -> Self {
        Self::with_cache(config, Arc::new(AstCache::new()))
    }

    /// 从配置文件创建加载器，配置读取或验证失败时返回错误
    pub fn from_config_file(path: impl AsRef<Path>) -> ScriptResult<Self> {
        let path = path.as_ref();
        let config = ScriptConfig::try_load(path)?;
        debug!(path = %path.display(), "loaded script config");
        Ok(Self::new(config))
    }

    /// 与其他加载器共享缓存
    pub fn with_cache(config: ScriptConfig, cache: Arc<AstCache>) -> Self {
        let catalog = config.catalog();
        Self {
            cache,
            config,
            catalog,
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AstCache> {
        &self.cache
    }

    /// 加载脚本：命中缓存时直接返回，否则读取、解析并写入缓存
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<ParsedScript>, LoadError> {
        let path = normalize_path(path.as_ref())?;

        if let Some(cached) = self.cache.get(&path) {
            debug!(path = %path.display(), "script cache hit");
            return Ok(cached);
        }

        let text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed = Arc::new(self.parse_text(&text));
        debug!(
            path = %path.display(),
            commands = parsed.commands.len(),
            errors = parsed.diagnostics.error_count(),
            "script parsed"
        );
        Ok(self.cache.insert_once(path, parsed))
    }

    /// 解析文本（不经过缓存）
    pub fn parse_text(&self, text: &str) -> ParsedScript {
        Parser::new(self.catalog.as_ref()).parse(text)
    }
}

impl std::fmt::Debug for AstLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstLoader")
            .field("cache", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// 转为绝对路径并按字面消去 `.` 与 `..`（不访问文件系统，不解析符号链接）
pub fn normalize_path(path: &Path) -> Result<PathBuf, LoadError> {
    let absolute = std::path::absolute(path).map_err(|e| LoadError::InvalidPath {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::error::ScriptError;

    #[test]
    fn test_normalize_path() {
        let base = std::env::temp_dir();
        let messy = base.join("a").join(".").join("b").join("..").join("c.goml");
        let clean = normalize_path(&messy).unwrap();
        assert_eq!(clean, normalize_path(&base.join("a").join("c.goml")).unwrap());
        assert!(clean.is_absolute());
    }

    #[test]
    fn test_cache_insert_once() {
        let cache = AstCache::new();
        let path = PathBuf::from("/x.goml");
        let first = Arc::new(Parser::default().parse("reload:"));
        let second = Arc::new(Parser::default().parse("click: 1"));

        let stored = cache.insert_once(path.clone(), Arc::clone(&first));
        assert!(Arc::ptr_eq(&stored, &first));
        let stored = cache.insert_once(path.clone(), second);
        assert!(Arc::ptr_eq(&stored, &first));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&path));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = AstLoader::new(ScriptConfig::default());
        let err = loader.load(dir.path().join("missing.goml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn test_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AstLoader::from_config_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ScriptError::Config(ConfigError::Io(_))));

        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"allow_unknown_commands": true}"#).unwrap();
        let loader = AstLoader::from_config_file(&path).unwrap();
        assert!(loader.config().allow_unknown_commands);
        assert!(loader.parse_text("not-a-command: 1").is_ok());

        fs::write(&path, "{").unwrap();
        let err = AstLoader::from_config_file(&path).unwrap_err();
        assert!(matches!(err, ScriptError::Config(ConfigError::Json(_))));
    }

    #[test]
    fn test_catalog_from_config() {
        let loader = AstLoader::new(ScriptConfig::default());
        let parsed = loader.parse_text("not-a-command: 1");
        assert_eq!(parsed.diagnostics.fatal_count(), 1);

        let config = ScriptConfig {
            allow_unknown_commands: true,
            ..ScriptConfig::default()
        };
        let parsed = AstLoader::new(config).parse_text("not-a-command: 1");
        assert!(parsed.is_ok());
    }
}
