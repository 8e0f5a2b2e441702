//! Emergency Access Tests
//!
//! Break-glass grants and the admin review that follows:
//! - One-hour window, alerts to the patient and every admin
//! - Review buckets, single-use review, stale-copy refusal by the server
//! - Emergency entries in the audit trail

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use medivault_client::{AdminEmergencyBoard, ApiError, DoctorBoard, Method};
    use medivault_core::audit::{emergency_entries, filter_entries, AuditAction, NotificationType};
    use medivault_core::{EmergencyGrant, EmergencyReason, ReviewDecision, ReviewStatus};

    use crate::cast::Cast;

    fn unconscious(cast: &Cast) -> EmergencyGrant {
        EmergencyGrant::new(
            cast.patient_code(),
            EmergencyReason::Unconscious,
            "Brought in after road accident, no ID on person",
            "ER-2026-0314-07",
        )
    }

    #[tokio::test]
    async fn test_grant_window_and_alerts() {
        let cast = Cast::signed_in().await;
        let granted = cast.doctor_client.grant_emergency(&unconscious(&cast)).await.unwrap();
        let now = cast.backend.now();
        assert_eq!(granted.expires_at, now + Duration::hours(1));
        assert_eq!(granted.review_status(), ReviewStatus::PendingReview);
        assert_eq!(granted.countdown_label(now), "60 minutes");

        for recipient in [cast.patient.id, cast.admin.id] {
            let alerts = cast.backend.notifications_for(recipient);
            assert!(alerts
                .iter()
                .any(|n| n.notification_type == NotificationType::EmergencyAccess && n.reference_id == Some(granted.id)));
        }

        cast.backend.advance(Duration::minutes(45));
        let board = DoctorBoard::load(&cast.doctor_client).await;
        let later = cast.doctor_client.now();
        assert_eq!(board.active_emergencies(later).len(), 1);
        assert_eq!(board.emergencies[0].minutes_left(later), 15);

        cast.backend.advance(Duration::minutes(16));
        let board = DoctorBoard::load(&cast.doctor_client).await;
        assert!(board.active_emergencies(cast.doctor_client.now()).is_empty());
        assert!(!board.emergencies[0].server_is_active);
    }

    #[tokio::test]
    async fn test_admin_review_is_single_use() {
        let cast = Cast::signed_in().await;
        let first = cast.doctor_client.grant_emergency(&unconscious(&cast)).await.unwrap();
        let second = cast
            .doctor_client
            .grant_emergency(&EmergencyGrant::new(
                cast.patient_code(),
                EmergencyReason::CriticalProcedure,
                "Emergency appendectomy",
                "OPD-5521",
            ))
            .await
            .unwrap();

        let mut board = AdminEmergencyBoard::load(&cast.admin_client).await;
        assert_eq!(board.unreviewed_count(), 2);

        let flagged = board
            .review(&cast.admin_client, first.id, &ReviewDecision::flag("No admission record for ER-2026-0314-07"))
            .await
            .unwrap();
        assert_eq!(flagged.review_status(), ReviewStatus::FlaggedMisuse);
        assert_eq!(board.unreviewed_count(), 1);
        assert_eq!(board.buckets.flagged.len(), 1);

        let cleared = board
            .review(&cast.admin_client, second.id, &ReviewDecision::clear("Theatre log matches"))
            .await
            .unwrap();
        assert_eq!(cleared.review_status(), ReviewStatus::Cleared);
        assert_eq!(board.unreviewed_count(), 0);
        assert_eq!(board.buckets.cleared.len(), 1);

        // Reviewed copy: refused locally, keeps its first outcome
        let err = cast
            .admin_client
            .review_emergency(&flagged, &ReviewDecision::clear("changed my mind"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        let path = format!("/access/emergency/{}/review/", first.id);
        assert_eq!(cast.backend.calls_to(Method::Post, &path), 1);

        // Unreviewed stale copy: the server refuses it
        let err = cast
            .admin_client
            .review_emergency(&first, &ReviewDecision::clear("changed my mind"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)), "got {:?}", err);
        assert!(cast.backend.emergencies()[0].is_flagged_misuse);
    }

    #[tokio::test]
    async fn test_only_admins_review() {
        let cast = Cast::signed_in().await;
        let granted = cast.doctor_client.grant_emergency(&unconscious(&cast)).await.unwrap();
        let err = cast
            .doctor_client
            .review_emergency(&granted, &ReviewDecision::clear("self review"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));

        let err = cast.doctor_client.all_emergencies().await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_emergency_in_audit_trail() {
        let cast = Cast::signed_in().await;
        cast.doctor_client.grant_emergency(&unconscious(&cast)).await.unwrap();

        let entries = cast.admin_client.audit_log().await.unwrap();
        let emergencies = emergency_entries(&entries);
        assert_eq!(emergencies.len(), 1);
        assert_eq!(emergencies[0].action, AuditAction::EmergencyAccess);
        assert_eq!(emergencies[0].patient_name.as_deref(), Some("Meera Iyer"));
        assert_eq!(filter_entries(&entries, "kiran").len(), 1);

        // The patient sees access to their own records
        let own = cast.patient_client.audit_log().await.unwrap();
        assert_eq!(own.len(), 1);
    }
}
