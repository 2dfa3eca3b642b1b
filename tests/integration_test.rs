use auto_apply::browser::connect_to_browser_and_page;
use auto_apply::config::Config;
use auto_apply::infrastructure::{CdpSurface, JsExecutor};
use auto_apply::models::{load_profile, load_settings, HistoryEntry, HistoryStatus, WorkItem};
use auto_apply::services::{Catalog, RateLimitSentinel};
use auto_apply::store::{JsonFileStore, Records};
use auto_apply::surface::{ElementRef, SelectorSet};
use auto_apply::utils::logging;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_browser_connection() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::from_env();

    // 测试浏览器连接
    let result =
        connect_to_browser_and_page(config.browser_debug_port, Some(&config.target_url), None)
            .await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_discover_jobs_on_live_page() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::from_env();

    // 连接浏览器（需要已登录并停在职位列表页）
    let (_browser, page) =
        connect_to_browser_and_page(config.browser_debug_port, Some(&config.target_url), None)
            .await
            .expect("连接浏览器失败");

    let surface = CdpSurface::new(JsExecutor::new(page));
    let selectors = SelectorSet::default();

    // 只扫描，不申请
    let catalog = Catalog::new(Arc::new(selectors.clone()))
        .discover(&surface, &HashSet::new(), 1)
        .await
        .expect("扫描列表页失败");
    println!("找到 {} 个职位", catalog.len());
    if let Some(first) = catalog.get(0) {
        println!("第一个职位: {} ({})", first.title, first.id);
    }

    let limited = RateLimitSentinel::new(&selectors)
        .detect(&surface)
        .await
        .expect("限流检测失败");
    assert!(!limited, "列表页不应该处于限流状态");
}

#[tokio::test]
async fn test_store_and_loaders_work_together() {
    let dir = tempfile::tempdir().unwrap();

    let profile_path = dir.path().join("profile.toml");
    let mut file = std::fs::File::create(&profile_path).unwrap();
    writeln!(
        file,
        r#"
fullName = "Grace Hopper"
email = "grace@example.com"
phone = "555-0199"
yearsExperience = "8"
"#
    )
    .unwrap();

    let settings_path = dir.path().join("settings.toml");
    std::fs::write(&settings_path, "maxAttempts = 2\ncooldownSecs = 0\n").unwrap();

    let profile = load_profile(&profile_path).await.unwrap();
    let settings = load_settings(&settings_path).await.unwrap();

    let store_path = dir.path().join("store.json");
    let records = Records::new(Arc::new(JsonFileStore::open(&store_path).await.unwrap()));
    records.save_profile(&profile).await.unwrap();
    records.save_settings(&settings).await.unwrap();
    records
        .record_history(HistoryEntry::from_item(
            &WorkItem::new("40001", ElementRef::new("n1")),
            HistoryStatus::Applied,
        ))
        .await
        .unwrap();

    // 重新打开后数据仍在
    let reopened = Records::new(Arc::new(JsonFileStore::open(&store_path).await.unwrap()));
    assert_eq!(reopened.profile().await.unwrap(), Some(profile));
    let loaded = reopened.settings().await.unwrap().unwrap();
    assert_eq!(loaded.max_attempts, 2);
    assert_eq!(loaded.cooldown_secs, 0);
    let history = reopened.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, HistoryStatus::Applied);
}
