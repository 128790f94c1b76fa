use crate::db::pool::DbPool;

pub const TENANT_PROVISIONED: &str = "tenant.provisioned";
pub const TENANT_ROLLED_BACK: &str = "tenant.rolled_back";

/// Log an audit event for a tenant to the audit_log table.
pub fn log_tenant_event(
    db: &DbPool,
    action: &str,
    tenant_id: &str,
    actor: Option<&str>,
    details: Option<&str>,
) -> anyhow::Result<()> {
    let id = uuid::Uuid::new_v4().to_string();
    db.write(|conn| {
        conn.execute(
            "INSERT INTO audit_log (id, actor_id, action, resource, resource_id, details)
             VALUES (?1, ?2, ?3, 'tenant', ?4, ?5)",
            rusqlite::params![id, actor, action, tenant_id, details],
        )?;
        Ok(())
    })
}

/// Audit writes never fail the operation being audited.
pub fn log_tenant_event_best_effort(
    db: &DbPool,
    action: &str,
    tenant_id: &str,
    actor: Option<&str>,
    details: Option<&str>,
) {
    if let Err(e) = log_tenant_event(db, action, tenant_id, actor, details) {
        tracing::warn!("failed to write audit event {} for {}: {:#}", action, tenant_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_actions(db: &DbPool, tenant_id: &str) -> Vec<String> {
        db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT action FROM audit_log
                 WHERE resource = 'tenant' AND resource_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let actions = stmt
                .query_map([tenant_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(actions)
        })
        .unwrap()
    }

    #[test]
    fn events_are_recorded_per_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbPool::open(&dir.path().join("platform.db"), 1).unwrap();
        crate::db::run_migrations(&db).unwrap();

        log_tenant_event(&db, TENANT_PROVISIONED, "tenant_a", Some("a@example.com"), None)
            .unwrap();
        log_tenant_event(&db, TENANT_ROLLED_BACK, "tenant_b", None, Some("{}")).unwrap();

        assert_eq!(tenant_actions(&db, "tenant_a"), vec![TENANT_PROVISIONED]);
        assert_eq!(tenant_actions(&db, "tenant_b"), vec![TENANT_ROLLED_BACK]);
        assert!(tenant_actions(&db, "tenant_c").is_empty());
    }

    #[test]
    fn best_effort_swallows_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbPool::open(&dir.path().join("empty.db"), 1).unwrap();
        // no migrations: the insert fails, but nothing propagates
        log_tenant_event_best_effort(&db, TENANT_PROVISIONED, "tenant_a", None, None);
    }
}
