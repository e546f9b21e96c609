use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// 从 TOML 文件加载配置
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let content = fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;
    parse_toml(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path.as_ref()))
}

/// 配置文件存在时加载，否则返回默认值
pub fn load_toml_or_default<T: DeserializeOwned + Default, P: AsRef<Path>>(path: P) -> anyhow::Result<T> {
    let path = path.as_ref();
    if path.exists() {
        log::info!("load config: {}", path.display());
        load_toml(path)
    } else {
        log::info!("config file not found, use default: {}", path.display());
        Ok(T::default())
    }
}

pub fn parse_toml<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_parse_partial_table() {
        let s: Sample = parse_toml("count = 3").unwrap();
        assert_eq!(s, Sample { name: String::new(), count: 3 });
    }

    #[test]
    fn test_parse_error_is_reported() {
        let r: anyhow::Result<Sample> = parse_toml("count = \"three\"");
        assert!(r.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let path = std::env::temp_dir().join("volren-missing-config-8d1f.toml");
        let s: Sample = load_toml_or_default(&path).unwrap();
        assert_eq!(s, Sample::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("volren-config-{}.toml", std::process::id()));
        fs::write(&path, "name = \"cube\"\ncount = 36\n").unwrap();
        let s: Sample = load_toml(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(s, Sample { name: "cube".to_string(), count: 36 });
    }
}
