use std::sync::Arc;

use async_trait::async_trait;
use embedgate_core::{AppError, AppResult, UserIdentity};
use embedgate_domain::{ReportAccessMapping, RoleMapping};
use tokio::sync::Mutex;

use super::{MappingAdminService, SaveReportAccessInput, SaveRoleMappingInput};
use crate::{AdminPolicy, ReportAccessStore, RoleMappingStore};

#[derive(Default)]
struct FakeMappingStore {
    role_mappings: Mutex<Vec<RoleMapping>>,
    report_access: Mutex<Vec<ReportAccessMapping>>,
    writes: Mutex<usize>,
}

#[async_trait]
impl RoleMappingStore for FakeMappingStore {
    async fn read_all_role_mappings(&self) -> AppResult<Vec<RoleMapping>> {
        let snapshot = self.role_mappings.lock().await.clone();
        tokio::task::yield_now().await;
        Ok(snapshot)
    }

    async fn write_all_role_mappings(&self, mappings: Vec<RoleMapping>) -> AppResult<()> {
        *self.writes.lock().await += 1;
        *self.role_mappings.lock().await = mappings;
        Ok(())
    }
}

#[async_trait]
impl ReportAccessStore for FakeMappingStore {
    async fn read_all_report_access(&self) -> AppResult<Vec<ReportAccessMapping>> {
        let snapshot = self.report_access.lock().await.clone();
        tokio::task::yield_now().await;
        Ok(snapshot)
    }

    async fn write_all_report_access(&self, mappings: Vec<ReportAccessMapping>) -> AppResult<()> {
        *self.writes.lock().await += 1;
        *self.report_access.lock().await = mappings;
        Ok(())
    }
}

fn admin() -> UserIdentity {
    UserIdentity::new("Admin@Co.com", "Admin")
}

fn service() -> (MappingAdminService, Arc<FakeMappingStore>) {
    let store = Arc::new(FakeMappingStore::default());
    let service = MappingAdminService::new(
        AdminPolicy::from_comma_separated("admin@co.com"),
        store.clone(),
        store.clone(),
    );
    (service, store)
}

fn role_input(email: &str, dataset: &str, roles: &[&str]) -> SaveRoleMappingInput {
    SaveRoleMappingInput {
        user_email: email.to_owned(),
        dataset_id: dataset.to_owned(),
        roles: roles.iter().map(|role| (*role).to_owned()).collect(),
    }
}

#[tokio::test]
async fn non_admin_cannot_touch_mappings() {
    let (service, store) = service();
    let intruder = UserIdentity::new("jane@co.com", "Jane");

    let listed = service.list_role_mappings(&intruder).await;
    let saved = service
        .save_role_mapping(&intruder, role_input("jane@co.com", "D1", &["Manager"]))
        .await;

    assert!(matches!(listed, Err(AppError::Forbidden(_))));
    assert!(matches!(saved, Err(AppError::Forbidden(_))));
    assert_eq!(*store.writes.lock().await, 0);
}

#[tokio::test]
async fn saving_replaces_existing_mapping_for_user_and_dataset() {
    let (service, store) = service();

    let first = service
        .save_role_mapping(&admin(), role_input("Jane@Co.com", "D1", &["Sales"]))
        .await;
    let second = service
        .save_role_mapping(&admin(), role_input("jane@co.com", "D1", &["Manager"]))
        .await;
    let other_dataset = service
        .save_role_mapping(&admin(), role_input("jane@co.com", "D2", &["Sales"]))
        .await;
    assert!(first.is_ok() && second.is_ok() && other_dataset.is_ok());

    let mappings = store.role_mappings.lock().await.clone();
    assert_eq!(mappings.len(), 2);
    let d1 = mappings
        .iter()
        .find(|mapping| mapping.dataset_id().as_str() == "D1")
        .map(|mapping| mapping.roles().as_slice().to_vec());
    assert_eq!(d1, Some(vec!["Manager".to_owned()]));
    assert!(
        mappings
            .iter()
            .all(|mapping| mapping.created_by() == "Admin@Co.com")
    );
}

#[tokio::test]
async fn saving_rejects_empty_role_list() {
    let (service, _) = service();

    let result = service
        .save_role_mapping(&admin(), role_input("jane@co.com", "D1", &[]))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn delete_with_dataset_removes_only_that_mapping() {
    let (service, store) = service();
    for dataset in ["D1", "D2"] {
        let saved = service
            .save_role_mapping(&admin(), role_input("jane@co.com", dataset, &["Sales"]))
            .await;
        assert!(saved.is_ok());
    }

    let removed = service
        .delete_role_mapping(&admin(), "JANE@co.com", Some("D1"))
        .await;

    assert!(matches!(removed, Ok(1)));
    let remaining = store.role_mappings.lock().await.clone();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].dataset_id().as_str(), "D2");
}

#[tokio::test]
async fn delete_without_dataset_removes_every_mapping_for_user() {
    let (service, store) = service();
    for (email, dataset) in [("jane@co.com", "D1"), ("jane@co.com", "D2"), ("bob@co.com", "D1")] {
        let saved = service
            .save_role_mapping(&admin(), role_input(email, dataset, &["Sales"]))
            .await;
        assert!(saved.is_ok());
    }

    let removed = service.delete_role_mapping(&admin(), "jane@co.com", None).await;

    assert!(matches!(removed, Ok(2)));
    let remaining = store.role_mappings.lock().await.clone();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_email().as_str(), "bob@co.com");
}

#[tokio::test]
async fn deleting_nothing_skips_the_write() {
    let (service, store) = service();

    let removed = service
        .delete_role_mapping(&admin(), "ghost@co.com", Some("D1"))
        .await;

    assert!(matches!(removed, Ok(0)));
    assert_eq!(*store.writes.lock().await, 0);
}

#[tokio::test]
async fn report_access_is_replaced_per_user() {
    let (service, store) = service();

    let first = service
        .save_report_access(
            &admin(),
            SaveReportAccessInput {
                user_email: "jane@co.com".to_owned(),
                report_ids: vec!["R1".to_owned(), "R2".to_owned()],
            },
        )
        .await;
    let second = service
        .save_report_access(
            &admin(),
            SaveReportAccessInput {
                user_email: "JANE@CO.COM".to_owned(),
                report_ids: vec!["R3".to_owned()],
            },
        )
        .await;
    assert!(first.is_ok() && second.is_ok());

    let mappings = store.report_access.lock().await.clone();
    assert_eq!(mappings.len(), 1);
    assert_eq!(
        mappings[0]
            .report_ids()
            .iter()
            .map(|id| id.as_str().to_owned())
            .collect::<Vec<_>>(),
        vec!["R3".to_owned()]
    );

    let removed = service.delete_report_access(&admin(), "jane@co.com").await;
    assert!(matches!(removed, Ok(1)));
    assert!(store.report_access.lock().await.is_empty());
}

#[tokio::test]
async fn report_access_rejects_blank_report_ids() {
    let (service, _) = service();

    let result = service
        .save_report_access(
            &admin(),
            SaveReportAccessInput {
                user_email: "jane@co.com".to_owned(),
                report_ids: vec!["R1".to_owned(), "".to_owned()],
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn interleaved_saves_keep_every_mapping() {
    let (service, store) = service();
    let other = service.clone();
    let actor = admin();

    let (first, second) = tokio::join!(
        service.save_role_mapping(&actor, role_input("a@co.com", "D1", &["Sales"])),
        other.save_role_mapping(&actor, role_input("b@co.com", "D1", &["EMEA"])),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(store.role_mappings.lock().await.len(), 2);
}
