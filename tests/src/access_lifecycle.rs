//! Access Request Lifecycle Tests
//!
//! A doctor asks, the patient answers, the grant runs out:
//! - Request → approve → active → expired on the clock
//! - Request → reject, and a stale second device refused by the server
//! - Approve → revoke before expiry
//! - Local refusals that never reach the server

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use medivault_client::{ApiError, Method, PatientAccessBoard};
    use medivault_core::audit::NotificationType;
    use medivault_core::{AccessStatus, NewAccessRequest, RequestFilter, Response, ScopeSelection, ScopeTag};

    use crate::cast::{sign_in, Cast, PASSWORD};

    fn follow_up(cast: &Cast, hours: u32) -> NewAccessRequest {
        let scope: ScopeSelection = [ScopeTag::Report, ScopeTag::Scan].into_iter().collect();
        NewAccessRequest::new(cast.patient_code(), scope, "post-op follow-up", hours)
    }

    fn respond_path(id: uuid::Uuid) -> String {
        format!("/access/{}/respond/", id)
    }

    #[tokio::test]
    async fn test_request_approve_then_expire() {
        let cast = Cast::signed_in().await;
        let created = cast
            .doctor_client
            .create_access_request(&follow_up(&cast, 48))
            .await
            .unwrap();
        assert_eq!(created.status, AccessStatus::Pending);
        assert_eq!(created.scope, vec![ScopeTag::Report, ScopeTag::Scan]);
        assert_eq!(created.patient, cast.patient.id);

        let mut board = PatientAccessBoard::load(&cast.patient_client).await;
        assert_eq!(board.pending_count(), 1);

        let approved = board
            .respond(
                &cast.patient_client,
                created.id,
                &Response::Approve { duration_hours: 48 },
                Some("Only the knee scans please".to_string()),
            )
            .await
            .unwrap();
        let now = cast.backend.now();
        assert_eq!(approved.status, AccessStatus::Approved);
        assert_eq!(approved.expires_at, Some(now + Duration::hours(48)));
        assert_eq!(approved.patient_note, "Only the knee scans please");

        // The board re-fetched after the mutation
        assert_eq!(board.pending_count(), 0);
        assert_eq!(board.active_count(now), 1);
        assert_eq!(board.filtered(RequestFilter::Active, now).len(), 1);

        let notified = cast.backend.notifications_for(cast.doctor.id);
        assert!(notified
            .iter()
            .any(|n| n.notification_type == NotificationType::AccessApproved && n.reference_id == Some(created.id)));

        // Past the window: both access tokens have lapsed too and get refreshed
        cast.backend.advance(Duration::hours(49));
        let mine = cast.doctor_client.my_requests().await.unwrap();
        let later = cast.doctor_client.now();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, AccessStatus::Approved);
        assert!(!mine[0].server_is_active);
        assert!(!mine[0].is_active(later));
        assert_eq!(mine[0].effective_status(later), AccessStatus::Expired);
        assert_eq!(mine[0].badge(later), "Expired");
        assert!(mine[0].available_responses(later).is_empty());

        // Revoking lapsed access is refused before any request is made
        let err = cast
            .patient_client
            .respond(&mine[0], &Response::Revoke, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        assert_eq!(cast.backend.calls_to(Method::Post, &respond_path(created.id)), 1);
    }

    #[tokio::test]
    async fn test_request_reject_and_stale_device() {
        let cast = Cast::signed_in().await;
        let created = cast
            .doctor_client
            .create_access_request(&follow_up(&cast, 24))
            .await
            .unwrap();

        // Second device loads the pending request before the first answers
        let tablet = sign_in(&cast.backend, &cast.patient).await;
        let stale = tablet.incoming_requests(None).await.unwrap();
        assert_eq!(stale[0].status, AccessStatus::Pending);

        let rejected = cast
            .patient_client
            .respond(&created, &Response::Reject, Some("Ask my GP instead".to_string()))
            .await
            .unwrap();
        assert_eq!(rejected.status, AccessStatus::Rejected);
        assert!(rejected.expires_at.is_none());

        // The stale copy passes the local check; the server has the last word
        let err = tablet
            .respond(&stale[0], &Response::Approve { duration_hours: 24 }, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)), "got {:?}", err);
        assert_eq!(cast.backend.access_requests()[0].status, AccessStatus::Rejected);

        // With the fresh copy the client refuses on its own
        let err = cast
            .patient_client
            .respond(&rejected, &Response::Approve { duration_hours: 24 }, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        assert_eq!(cast.backend.calls_to(Method::Post, &respond_path(created.id)), 2);

        let mine = cast.doctor_client.my_requests().await.unwrap();
        assert_eq!(mine[0].badge(cast.doctor_client.now()), "Rejected");
        assert_eq!(mine[0].patient_note, "Ask my GP instead");
    }

    #[tokio::test]
    async fn test_revoke_before_expiry() {
        let cast = Cast::signed_in().await;
        let created = cast
            .doctor_client
            .create_access_request(&follow_up(&cast, 24))
            .await
            .unwrap();
        let approved = cast
            .patient_client
            .respond(&created, &Response::Approve { duration_hours: 24 }, None)
            .await
            .unwrap();

        cast.backend.advance(Duration::hours(2));
        let now = cast.patient_client.now();
        assert!(approved.is_active(now));
        assert_eq!(approved.time_left_label(now), "22h 0m left");

        let revoked = cast
            .patient_client
            .respond(&approved, &Response::Revoke, None)
            .await
            .unwrap();
        assert_eq!(revoked.status, AccessStatus::Revoked);
        assert!(!revoked.is_active(now));

        let alerts: Vec<_> = cast
            .backend
            .notifications_for(cast.doctor.id)
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::AccessRevoked)
            .collect();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].notification_type.is_alert());

        let err = cast
            .patient_client
            .respond(&revoked, &Response::Revoke, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_unapproved_doctor_refused_locally() {
        let cast = Cast::signed_in().await;
        let newcomer = cast
            .backend
            .add_doctor("Lina Das", "lina@example.org", PASSWORD, false);
        let client = sign_in(&cast.backend, &newcomer).await;

        let err = client
            .create_access_request(&follow_up(&cast, 24))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
        assert_eq!(cast.backend.calls_to(Method::Post, "/access/request/"), 0);
    }

    #[tokio::test]
    async fn test_unknown_patient_is_not_found() {
        let cast = Cast::signed_in().await;
        let form = NewAccessRequest::new("MV00000000", ScopeSelection::default(), "consult", 24);
        let err = cast.doctor_client.create_access_request(&form).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_out_of_range_duration_is_validation() {
        let cast = Cast::signed_in().await;
        let err = cast
            .doctor_client
            .create_access_request(&follow_up(&cast, 721))
            .await
            .unwrap_err();
        assert!(!err.field_messages("duration_hours").is_empty());
        assert_eq!(cast.backend.calls_to(Method::Post, "/access/request/"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_responses_to_one_request() {
        let cast = Cast::signed_in().await;
        let created = cast
            .doctor_client
            .create_access_request(&follow_up(&cast, 24))
            .await
            .unwrap();

        let approve = Response::Approve { duration_hours: 24 };
        let (first, second) = tokio::join!(
            cast.patient_client.respond(&created, &approve, None),
            cast.patient_client.respond(&created, &Response::Reject, None),
        );
        assert_eq!(first.unwrap().status, AccessStatus::Approved);
        assert!(matches!(second, Err(ApiError::Busy(_))));
        assert!(!cast.patient_client.inflight().contains(created.id));
        assert_eq!(cast.backend.calls_to(Method::Post, &respond_path(created.id)), 1);
    }
}
