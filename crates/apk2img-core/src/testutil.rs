//! Shared builders for unit tests.

use crate::row::FeatureRow;

pub(crate) fn sample_row(file_name: &str, permissions: &[&str]) -> FeatureRow {
    FeatureRow {
        package: "com.example.app".to_string(),
        icon_count: 4,
        audio_count: 1,
        video_count: 0,
        size_bytes: 3_500_000,
        activity_count: 6,
        meta_data_count: 2,
        service_count: 3,
        permission_count: permissions.len() as u32,
        action_count: 2,
        provider_count: 1,
        receiver_count: 2,
        category_count: 1,
        permissions: permissions.iter().map(|s| s.to_string()).collect(),
        actions: vec!["android.intent.action.MAIN".to_string()],
        services: vec![".SyncService".to_string()],
        categories: vec!["android.intent.category.LAUNCHER".to_string()],
        file_name: file_name.to_string(),
    }
}
