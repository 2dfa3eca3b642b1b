//! 表单字段填写
//!
//! 标签匹配规则是一张有序的表：从上往下找第一条适用的规则，越具体的规则越靠前
//! （“first name” 在 “name” 之前，“email address” 在 “address” 之前）。
//! 资料和姓名规则排在技能规则之前，技能名按整词匹配。
//! 只填写当前为空的字段、没有选中项的单选组。
//!
//! `plan_fills` 是纯函数，只产出填写计划；`apply_fills` 通过页面接口执行。

use crate::error::{SurfaceError, SurfaceResult};
use crate::models::{ProfileData, SkillEntry};
use crate::surface::{ElementRef, FieldKind, FormField, PageSurface};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// 字段类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    Phone,
    Email,
    ProfileUrl,
    Location,
    SkillYears,
    SkillAnswer,
    YearsExperience,
    NoticePeriod,
    FirstName,
    LastName,
    FullName,
    WorkAuthorization,
    SkillSummary,
    BooleanAnswer,
}

struct FieldRule {
    category: FieldCategory,
    kinds: &'static [FieldKind],
    applies: fn(&str, &ProfileData) -> bool,
    answers: fn(&str, &ProfileData) -> Vec<String>,
}

const TEXT_LIKE: &[FieldKind] = &[FieldKind::Text, FieldKind::Tel, FieldKind::Url, FieldKind::Number];
const SHORT_TEXT: &[FieldKind] = &[FieldKind::Text, FieldKind::Number];
const CHOICE: &[FieldKind] = &[FieldKind::Select, FieldKind::Radio];

const YES_LABELS: &[&str] = &["yes", "true", "available", "y"];
const NO_LABELS: &[&str] = &["no", "false"];

fn has_any(label: &str, words: &[&str]) -> bool {
    words.iter().any(|w| label.contains(w))
}

fn one(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.is_empty() {
        Vec::new()
    } else {
        vec![value.to_string()]
    }
}

/// 技能名必须作为独立的词出现（“C” 不能命中 “notice”）
fn skill_pattern(name: &str) -> Option<Regex> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(name))).ok()
}

fn matched_skill(label: &str, profile: &ProfileData) -> Option<SkillEntry> {
    profile.skill_entries().into_iter().find(|entry| {
        skill_pattern(&entry.name).is_some_and(|pattern| pattern.is_match(label))
    })
}

fn always(_: &str, _: &ProfileData) -> bool {
    true
}

fn phone(label: &str, _: &ProfileData) -> bool {
    has_any(label, &["phone", "mobile", "telephone"])
}

fn email(label: &str, _: &ProfileData) -> bool {
    label.contains("email")
}

fn profile_url(label: &str, _: &ProfileData) -> bool {
    has_any(label, &["linkedin", "profile url"])
}

fn location(label: &str, _: &ProfileData) -> bool {
    has_any(label, &["city", "location", "address"])
}

fn skill_years(label: &str, profile: &ProfileData) -> bool {
    label.contains("year") && matched_skill(label, profile).is_some()
}

fn skill_named(label: &str, profile: &ProfileData) -> bool {
    matched_skill(label, profile).is_some()
}

fn years_experience(label: &str, profile: &ProfileData) -> bool {
    label.contains("year") && label.contains("experience") && matched_skill(label, profile).is_none()
}

fn notice_period(label: &str, _: &ProfileData) -> bool {
    has_any(label, &["notice", "availability"])
}

fn first_name(label: &str, _: &ProfileData) -> bool {
    has_any(label, &["first name", "given name", "firstname"])
}

fn last_name(label: &str, _: &ProfileData) -> bool {
    has_any(label, &["last name", "surname", "family name", "lastname"])
}

fn full_name(label: &str, _: &ProfileData) -> bool {
    label.contains("name") && !has_any(label, &["company", "organization"])
}

fn work_authorization(label: &str, profile: &ProfileData) -> bool {
    label.contains("authoriz") && !profile.work_authorization.trim().is_empty()
}

fn skill_summary(label: &str, profile: &ProfileData) -> bool {
    has_any(label, &["skill", "expertise"]) && !profile.skill_entries().is_empty()
}

/// 从上往下匹配，第一条适用的规则生效
const RULES: &[FieldRule] = &[
    FieldRule {
        category: FieldCategory::Phone,
        kinds: TEXT_LIKE,
        applies: phone,
        answers: |_, p| one(&p.phone),
    },
    FieldRule {
        category: FieldCategory::Email,
        kinds: &[FieldKind::Email],
        applies: always,
        answers: |_, p| one(&p.email),
    },
    FieldRule {
        category: FieldCategory::Email,
        kinds: TEXT_LIKE,
        applies: email,
        answers: |_, p| one(&p.email),
    },
    FieldRule {
        category: FieldCategory::ProfileUrl,
        kinds: TEXT_LIKE,
        applies: profile_url,
        answers: |_, p| one(&p.profile_url),
    },
    FieldRule {
        category: FieldCategory::Location,
        kinds: TEXT_LIKE,
        applies: location,
        answers: |_, p| one(&p.location),
    },
    FieldRule {
        category: FieldCategory::YearsExperience,
        kinds: TEXT_LIKE,
        applies: years_experience,
        answers: |_, p| one(&p.years_or_default()),
    },
    FieldRule {
        category: FieldCategory::NoticePeriod,
        kinds: TEXT_LIKE,
        applies: notice_period,
        answers: |_, p| one(&p.notice_period),
    },
    FieldRule {
        category: FieldCategory::FirstName,
        kinds: TEXT_LIKE,
        applies: first_name,
        answers: |_, p| one(&p.first_name()),
    },
    FieldRule {
        category: FieldCategory::LastName,
        kinds: TEXT_LIKE,
        applies: last_name,
        answers: |_, p| one(&p.last_name()),
    },
    FieldRule {
        category: FieldCategory::FullName,
        kinds: TEXT_LIKE,
        applies: full_name,
        answers: |_, p| one(&p.full_name),
    },
    FieldRule {
        category: FieldCategory::SkillYears,
        kinds: SHORT_TEXT,
        applies: skill_years,
        answers: |label, p| match matched_skill(label, p).and_then(|s| s.experience) {
            Some(exp) if !exp.trim().is_empty() => one(&exp),
            _ => one(&p.years_or_default()),
        },
    },
    FieldRule {
        category: FieldCategory::SkillAnswer,
        kinds: SHORT_TEXT,
        applies: skill_named,
        answers: |label, p| match matched_skill(label, p) {
            Some(skill) if !skill.has_skill() => one("No"),
            _ => one("Yes"),
        },
    },
    FieldRule {
        category: FieldCategory::SkillAnswer,
        kinds: CHOICE,
        applies: skill_named,
        answers: |label, p| {
            let labels = match matched_skill(label, p) {
                Some(skill) if !skill.has_skill() => NO_LABELS,
                _ => YES_LABELS,
            };
            labels.iter().map(|s| s.to_string()).collect()
        },
    },
    FieldRule {
        category: FieldCategory::WorkAuthorization,
        kinds: CHOICE,
        applies: work_authorization,
        answers: |_, p| vec![p.work_authorization.trim().to_lowercase()],
    },
    FieldRule {
        category: FieldCategory::SkillSummary,
        kinds: &[FieldKind::Textarea],
        applies: skill_summary,
        answers: |_, p| one(&p.skill_summary()),
    },
    FieldRule {
        category: FieldCategory::BooleanAnswer,
        kinds: &[FieldKind::Radio],
        applies: always,
        answers: |_, _| vec!["yes".to_string()],
    },
];

/// 字段对应的类别（第一条适用的规则）
pub fn classify(kind: FieldKind, label: &str, profile: &ProfileData) -> Option<FieldCategory> {
    find_rule(kind, &label.to_lowercase(), profile).map(|rule| rule.category)
}

fn find_rule(kind: FieldKind, label: &str, profile: &ProfileData) -> Option<&'static FieldRule> {
    RULES
        .iter()
        .find(|rule| rule.kinds.contains(&kind) && (rule.applies)(label, profile))
}

/// 在选项中找第一个包含任一候选词的，`BooleanAnswer` 找不到时退回第一个选项
fn choose(options: &[&str], candidates: &[String], fallback_first: bool) -> Option<usize> {
    options
        .iter()
        .position(|option| {
            let option = option.to_lowercase();
            candidates.iter().any(|c| !c.is_empty() && option.contains(c.as_str()))
        })
        .or_else(|| (fallback_first && !options.is_empty()).then_some(0))
}

/// 填写动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillAction {
    SetValue { element: ElementRef, value: String },
    SelectOption { element: ElementRef, option: String },
    Click { element: ElementRef },
}

/// 一项计划中的填写
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFill {
    pub key: String,
    pub category: FieldCategory,
    pub action: FillAction,
}

/// 生成填写计划
///
/// `already` 中的字段键本次会话已经填过，不再重复填写。
pub fn plan_fills(
    fields: &[FormField],
    profile: &ProfileData,
    already: &HashSet<String>,
) -> Vec<PlannedFill> {
    let mut plan = Vec::new();
    let mut seen_groups = HashSet::new();

    for field in fields {
        let key = field.key();
        if already.contains(&key) {
            continue;
        }
        let label = field.label.to_lowercase();

        match field.kind {
            FieldKind::Checkbox | FieldKind::Other => {}
            FieldKind::Radio => {
                if !seen_groups.insert(key.clone()) {
                    continue;
                }
                let group: Vec<&FormField> = fields
                    .iter()
                    .filter(|f| f.kind == FieldKind::Radio && f.key() == key)
                    .collect();
                if group.iter().any(|f| f.checked) {
                    continue;
                }
                let Some(rule) = find_rule(field.kind, &label, profile) else {
                    continue;
                };
                let answers = (rule.answers)(&label, profile);
                let options: Vec<&str> = group.iter().map(|f| f.option_label.as_str()).collect();
                let fallback = rule.category == FieldCategory::BooleanAnswer;
                if let Some(idx) = choose(&options, &answers, fallback) {
                    plan.push(PlannedFill {
                        key,
                        category: rule.category,
                        action: FillAction::Click {
                            element: group[idx].element.clone(),
                        },
                    });
                }
            }
            FieldKind::Select => {
                if !field.is_empty() {
                    continue;
                }
                let Some(rule) = find_rule(field.kind, &label, profile) else {
                    continue;
                };
                let answers = (rule.answers)(&label, profile);
                let options: Vec<&str> = field.options.iter().map(String::as_str).collect();
                if let Some(idx) = choose(&options, &answers, false) {
                    plan.push(PlannedFill {
                        key,
                        category: rule.category,
                        action: FillAction::SelectOption {
                            element: field.element.clone(),
                            option: field.options[idx].clone(),
                        },
                    });
                }
            }
            _ => {
                if !field.is_empty() {
                    continue;
                }
                let Some(rule) = find_rule(field.kind, &label, profile) else {
                    continue;
                };
                if let Some(value) = (rule.answers)(&label, profile).into_iter().next() {
                    plan.push(PlannedFill {
                        key,
                        category: rule.category,
                        action: FillAction::SetValue {
                            element: field.element.clone(),
                            value,
                        },
                    });
                }
            }
        }
    }

    plan
}

/// 执行填写计划，返回成功执行的数量（已失效的元素直接跳过）
pub async fn apply_fills<S: PageSurface + ?Sized>(
    surface: &S,
    plan: &[PlannedFill],
) -> SurfaceResult<usize> {
    let mut applied = 0;
    for fill in plan {
        let result = match &fill.action {
            FillAction::SetValue { element, value } => surface.set_value(element, value).await,
            FillAction::SelectOption { element, option } => {
                surface.select_option(element, option).await
            }
            FillAction::Click { element } => surface.click(element).await,
        };
        match result {
            Ok(()) => {
                debug!("✏️ 填写 {:?} ({})", fill.category, fill.key);
                applied += 1;
            }
            Err(SurfaceError::StaleElement(el)) => debug!("字段 {} 已失效，跳过", el),
            Err(e) => return Err(e),
        }
    }
    Ok(applied)
}

/// 是否还有未填写的必填项（单选组按组判断）
pub fn has_unanswered_required(fields: &[FormField]) -> bool {
    let mut checked_groups = HashSet::new();
    for field in fields.iter().filter(|f| f.required) {
        match field.kind {
            FieldKind::Radio => {
                let key = field.key();
                if !checked_groups.insert(key.clone()) {
                    continue;
                }
                let answered = fields
                    .iter()
                    .any(|f| f.kind == FieldKind::Radio && f.key() == key && f.checked);
                if !answered {
                    return true;
                }
            }
            _ => {
                if field.is_empty() {
                    return true;
                }
            }
        }
    }
    false
}
