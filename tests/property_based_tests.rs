//! Property-based tests for job decoding and result encoding

use proptest::prelude::*;
use serde_json::{Value, json};

use scrapebox::handlers::{HandlerResult, Payload, ResultStatus};
use scrapebox::messaging::{DEFAULT_ACTION, Job, JobResult, UNKNOWN_JOB_ID};

fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map("[a-z_]{1,12}", any::<i64>(), 0..6).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect()
    })
}

proptest! {
    #[test]
    fn job_survives_encode_decode(
        job_id in "[a-zA-Z0-9-]{1,36}",
        site_id in "[a-z]{1,16}",
        action in "[a-z_]{1,24}",
        payload in payload_strategy(),
    ) {
        let job = Job::new(job_id, site_id)
            .with_action(action)
            .with_payload(payload);

        let decoded = Job::from_slice(&job.to_vec().unwrap()).unwrap();
        prop_assert_eq!(decoded, job);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults(site_id in proptest::option::of("[a-z]{1,16}")) {
        let body = match &site_id {
            Some(site_id) => json!({ "site_id": site_id }),
            None => json!({}),
        };

        let job = Job::from_slice(&serde_json::to_vec(&body).unwrap()).unwrap();
        prop_assert_eq!(job.job_id.as_str(), UNKNOWN_JOB_ID);
        prop_assert_eq!(job.action.as_str(), DEFAULT_ACTION);
        prop_assert!(job.payload.is_empty());
        prop_assert_eq!(job.site_id(), site_id.as_deref());
    }

    #[test]
    fn arbitrary_bytes_never_panic(body in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Job::from_slice(&body);
    }

    #[test]
    fn result_always_carries_job_identity(
        job_id in "[a-z0-9]{1,12}",
        error in "[ -~]{0,40}",
    ) {
        let job = Job::new(job_id.clone(), "demo");
        let result = JobResult::from_handler(&job, HandlerResult::failed(error.clone()));

        let encoded: Value = serde_json::from_slice(&result.to_vec().unwrap()).unwrap();
        prop_assert_eq!(&encoded["job_id"], &Value::from(job_id));
        prop_assert_eq!(&encoded["status"], &Value::from(ResultStatus::Failed.as_str()));
        prop_assert_eq!(&encoded["error"], &Value::from(error));
        prop_assert!(encoded["metadata"]["processed_at"].is_string());
    }
}
