//! 用户资料（填表用的数据）

use serde::{Deserialize, Serialize};

/// 技能条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillEntry {
    pub name: String,
    /// 是否具备该技能，缺省视为具备
    #[serde(default)]
    pub has_skill: Option<bool>,
    /// 该技能的经验年限
    #[serde(default)]
    pub experience: Option<String>,
}

impl SkillEntry {
    pub fn has_skill(&self) -> bool {
        self.has_skill != Some(false)
    }
}

/// 技能字段既可以是列表，也可以是逗号分隔的字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Skills {
    List(Vec<SkillEntry>),
    Csv(String),
}

impl Default for Skills {
    fn default() -> Self {
        Skills::List(Vec::new())
    }
}

/// 用户资料
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileData {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    #[serde(alias = "linkedinProfile")]
    pub profile_url: String,
    pub years_experience: String,
    pub notice_period: String,
    pub work_authorization: String,
    pub skills: Skills,
}

impl ProfileData {
    pub fn first_name(&self) -> String {
        self.full_name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub fn last_name(&self) -> String {
        self.full_name
            .split_whitespace()
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 有效的技能条目（忽略空名称）
    pub fn skill_entries(&self) -> Vec<SkillEntry> {
        match &self.skills {
            Skills::List(list) => list
                .iter()
                .filter(|s| !s.name.trim().is_empty())
                .cloned()
                .collect(),
            Skills::Csv(csv) => csv
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| SkillEntry {
                    name: name.to_string(),
                    has_skill: Some(true),
                    experience: None,
                })
                .collect(),
        }
    }

    /// 技能摘要，如 "Rust (4 yrs), SQL"
    pub fn skill_summary(&self) -> String {
        self.skill_entries()
            .iter()
            .map(|entry| match &entry.experience {
                Some(exp) if !exp.is_empty() => format!("{} ({} yrs)", entry.name, exp),
                _ => entry.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 经验年限，缺省为 3
    pub fn years_or_default(&self) -> String {
        if self.years_experience.trim().is_empty() {
            "3".to_string()
        } else {
            self.years_experience.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_split() {
        let profile = ProfileData {
            full_name: "Ada Maria Lovelace".into(),
            ..Default::default()
        };
        assert_eq!(profile.first_name(), "Ada");
        assert_eq!(profile.last_name(), "Maria Lovelace");
    }

    #[test]
    fn test_skills_from_csv_and_list() {
        let csv: ProfileData = serde_json::from_str(r#"{"skills": "Rust, SQL , ,Go"}"#).unwrap();
        let names: Vec<_> = csv.skill_entries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Rust", "SQL", "Go"]);

        let list: ProfileData = serde_json::from_str(
            r#"{"skills": [{"name": "Rust", "experience": "4"}, {"name": "COBOL", "hasSkill": false}]}"#,
        )
        .unwrap();
        let entries = list.skill_entries();
        assert!(entries[0].has_skill());
        assert!(!entries[1].has_skill());
        assert_eq!(list.skill_summary(), "Rust (4 yrs), COBOL");
    }

    #[test]
    fn test_legacy_profile_key_is_accepted() {
        let profile: ProfileData =
            serde_json::from_str(r#"{"linkedinProfile": "https://linkedin.com/in/ada"}"#).unwrap();
        assert_eq!(profile.profile_url, "https://linkedin.com/in/ada");
        assert_eq!(profile.years_or_default(), "3");
    }
}
