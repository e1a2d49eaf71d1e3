use serde_json::{Map, Value};
use tracing::{debug, warn};

use sparkscan_types::{
    CarryState, ExtractError, ExtractedRecord, Extraction, RawEvent, json_type_name,
};

const JOB_DESCRIPTION_KEY: &str = "spark.job.description";

/// Classifies driver events and pulls the job context out of them
pub struct EventExtractor;

impl EventExtractor {
    /// Run one event through the extractor.
    ///
    /// - An event carrying `properties.Properties."spark.job.description"`
    ///   (non-null) is emitted, stamped with the last known user.
    /// - Otherwise a non-empty string `properties.User` replaces the last
    ///   known user and nothing is emitted.
    /// - Anything else is suppressed without touching the state.
    ///
    /// Field lookups never fail on missing keys. An event whose `properties`
    /// (or `properties.Properties`) is present but not an object is logged and
    /// returned as [`Extraction::Failed`]; the state is left untouched.
    pub fn extract(event: &RawEvent, state: &mut CarryState) -> Extraction {
        match Self::try_extract(event, state) {
            Ok(Some(record)) => Extraction::Emitted(record),
            Ok(None) => Extraction::Suppressed,
            Err(err) => {
                warn!(error = %err, "failed to extract event fields");
                Extraction::Failed(err)
            }
        }
    }

    fn try_extract(
        event: &RawEvent,
        state: &mut CarryState,
    ) -> Result<Option<ExtractedRecord>, ExtractError> {
        let fields = event.as_object().ok_or(ExtractError::EventNotObject {
            found: json_type_name(event),
        })?;

        let properties = nested_object(fields, "properties", "properties")?;
        let spark_properties = match properties {
            Some(properties) => nested_object(properties, "Properties", "properties.Properties")?,
            None => None,
        };

        let job_description = spark_properties
            .and_then(|p| p.get(JOB_DESCRIPTION_KEY))
            .filter(|v| !v.is_null());

        let Some(job_description) = job_description else {
            if let Some(user) = properties.and_then(|p| p.get("User")) {
                Self::observe_user(user, state);
            }
            return Ok(None);
        };

        let field = |key: &str| fields.get(key).filter(|v| !v.is_null()).cloned();

        Ok(Some(ExtractedRecord {
            timestamp: field("timestamp"),
            category: field("category"),
            fabric_livy_id: field("fabricLivyId"),
            application_id: field("applicationId"),
            application_name: field("applicationName"),
            executor_id: field("executorId"),
            fabric_tenant_id: field("fabricTenantId"),
            capacity_id: field("capacityId"),
            artifact_type: field("artifactType"),
            artifact_id: field("artifactId"),
            fabric_workspace_id: field("fabricWorkspaceId"),
            fabric_env_id: field("fabricEnvId"),
            job_description: Some(job_description.clone()),
            user: state.user().map(str::to_string),
        }))
    }

    fn observe_user(user: &Value, state: &mut CarryState) {
        match user {
            Value::String(user) => {
                if state.observe_user(user) {
                    debug!(user = %user, "carrying forward user");
                }
            }
            Value::Null => {}
            other => warn!(found = json_type_name(other), "ignoring non-string properties.User"),
        }
    }
}

fn nested_object<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &'static str,
) -> Result<Option<&'a Map<String, Value>>, ExtractError> {
    match parent.get(key) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(ExtractError::NotAnObject {
            path,
            found: json_type_name(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_event(description: &str) -> Value {
        json!({
            "timestamp": "t",
            "properties": { "Properties": { "spark.job.description": description } }
        })
    }

    fn user_event(user: &str) -> Value {
        json!({ "timestamp": "t", "properties": { "User": user } })
    }

    #[test]
    fn test_emits_job_description() {
        let mut state = CarryState::new();
        let event = json!({
            "timestamp": "t1",
            "properties": { "Properties": { "spark.job.description": "job-A" } },
            "applicationId": "app1"
        });

        let result = EventExtractor::extract(&event, &mut state);
        let record = result.record().expect("should emit");
        assert_eq!(record.timestamp, Some(json!("t1")));
        assert_eq!(record.application_id, Some(json!("app1")));
        assert_eq!(record.job_description, Some(json!("job-A")));
        assert_eq!(record.executor_id, None);
        assert_eq!(record.user, None);
    }

    #[test]
    fn test_job_description_wins_over_user() {
        let mut state = CarryState::new();
        state.observe_user("alice");
        let event = json!({
            "properties": {
                "User": "mallory",
                "Properties": { "spark.job.description": "job-A" }
            }
        });

        let record = EventExtractor::extract(&event, &mut state)
            .record()
            .cloned()
            .expect("should emit");
        assert_eq!(record.user.as_deref(), Some("alice"));
        assert_eq!(state.user(), Some("alice"));
    }

    #[test]
    fn test_user_event_updates_state() {
        let mut state = CarryState::new();
        let result = EventExtractor::extract(&user_event("alice"), &mut state);
        assert!(result.is_suppressed());
        assert_eq!(state.user(), Some("alice"));
    }

    #[test]
    fn test_empty_or_missing_user_keeps_state() {
        let mut state = CarryState::new();
        state.observe_user("alice");

        assert!(EventExtractor::extract(&user_event(""), &mut state).is_suppressed());
        assert!(EventExtractor::extract(&json!({"timestamp": "t"}), &mut state).is_suppressed());
        assert!(
            EventExtractor::extract(&json!({"properties": {"User": null}}), &mut state)
                .is_suppressed()
        );
        assert_eq!(state.user(), Some("alice"));
    }

    #[test]
    fn test_null_job_description_falls_through_to_user() {
        let mut state = CarryState::new();
        let event = json!({
            "properties": {
                "User": "bob",
                "Properties": { "spark.job.description": null }
            }
        });
        assert!(EventExtractor::extract(&event, &mut state).is_suppressed());
        assert_eq!(state.user(), Some("bob"));
    }

    #[test]
    fn test_carry_forward_sequence() {
        let mut state = CarryState::new();
        let events = [
            user_event("alice"),
            job_event("job-1"),
            user_event("bob"),
            job_event("job-2"),
        ];

        let users: Vec<Option<String>> = events
            .iter()
            .filter_map(|e| EventExtractor::extract(e, &mut state).record().cloned())
            .map(|r| r.user)
            .collect();
        assert_eq!(users, vec![Some("alice".to_string()), Some("bob".to_string())]);
    }

    #[test]
    fn test_non_string_job_description_copied_verbatim() {
        let mut state = CarryState::new();
        let event = json!({
            "properties": { "Properties": { "spark.job.description": { "id": 7 } } }
        });
        let record = EventExtractor::extract(&event, &mut state)
            .record()
            .cloned()
            .expect("should emit");
        assert_eq!(record.job_description, Some(json!({ "id": 7 })));

        let event = json!({
            "properties": { "Properties": { "spark.job.description": "" } }
        });
        assert!(EventExtractor::extract(&event, &mut state).record().is_some());
    }

    #[test]
    fn test_malformed_properties_fail_without_state_change() {
        let mut state = CarryState::new();
        state.observe_user("alice");

        let result = EventExtractor::extract(&json!({"properties": "oops"}), &mut state);
        assert_eq!(
            result,
            Extraction::Failed(ExtractError::NotAnObject {
                path: "properties",
                found: "a string",
            })
        );

        let result = EventExtractor::extract(
            &json!({"properties": {"User": "bob", "Properties": [1, 2]}}),
            &mut state,
        );
        assert!(matches!(result, Extraction::Failed(_)));
        assert_eq!(state.user(), Some("alice"));

        let result = EventExtractor::extract(&json!({"properties": null}), &mut state);
        assert!(matches!(result, Extraction::Failed(_)));

        let result = EventExtractor::extract(&json!(["not", "an", "object"]), &mut state);
        assert!(matches!(
            result,
            Extraction::Failed(ExtractError::EventNotObject { .. })
        ));
    }

    #[test]
    fn test_non_string_user_is_ignored() {
        let mut state = CarryState::new();
        let result = EventExtractor::extract(&json!({"properties": {"User": 42}}), &mut state);
        assert!(result.is_suppressed());
        assert_eq!(state.user(), None);
    }
}
