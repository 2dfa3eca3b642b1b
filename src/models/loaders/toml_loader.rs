use crate::config::Settings;
use crate::error::{AppError, AppResult, ConfigError};
use crate::models::profile::ProfileData;
use crate::surface::SelectorSet;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;

/// 读取 TOML 文件并反序列化为指定类型
async fn load_toml<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::config_read_failed(path.display().to_string(), e))?;

    let value: T = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
        path: path.display().to_string(),
        source,
    })?;

    Ok(value)
}

/// 从 TOML 文件加载用户资料
pub async fn load_profile(path: &Path) -> AppResult<ProfileData> {
    let profile: ProfileData = load_toml(path).await?;
    if profile.full_name.trim().is_empty() {
        tracing::warn!("资料文件 {} 中没有填写姓名", path.display());
    }
    tracing::info!(
        "成功加载用户资料: {} 个技能",
        profile.skill_entries().len()
    );
    Ok(profile)
}

/// 从 TOML 文件加载运行设置
pub async fn load_settings(path: &Path) -> AppResult<Settings> {
    let settings: Settings = load_toml(path).await?;
    Ok(settings.normalized())
}

/// 从 TOML 文件加载选择器表（缺省的条目使用内置值）
pub async fn load_selectors(path: &Path) -> AppResult<SelectorSet> {
    load_toml(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_profile_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
fullName = "Ada Lovelace"
email = "ada@example.com"
phone = "555-0100"
skills = [{{ name = "Rust", experience = "4" }}]
"#
        )
        .unwrap();

        let profile = load_profile(file.path()).await.unwrap();
        assert_eq!(profile.first_name(), "Ada");
        assert_eq!(profile.skill_summary(), "Rust (4 yrs)");
    }

    #[tokio::test]
    async fn test_load_settings_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cooldownSecs = 3\ndelayMinMs = 9000\ndelayMaxMs = 1000").unwrap();

        let settings = load_settings(file.path()).await.unwrap();
        assert_eq!(settings.cooldown_secs, 3);
        assert_eq!(settings.max_attempts, 3);
        assert!(settings.delay_min_ms <= settings.delay_max_ms);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let result = load_profile(Path::new("/definitely/not/here.toml")).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::FileReadFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_malformed_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cooldownSecs = = 3").unwrap();

        let err = load_settings(file.path()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::TomlParseFailed { .. })
        ));
        assert!(err.to_string().contains("TOML"));
    }
}
