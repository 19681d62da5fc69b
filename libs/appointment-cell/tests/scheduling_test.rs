// =====================================================================================
// SCHEDULING ENGINE TESTS
// =====================================================================================

mod common;

use std::collections::HashMap;

use assert_matches::assert_matches;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use appointment_cell::{AppointmentStatus, AppointmentStore, NotificationStore, SchedulingError, Slot, SlotStore};
use common::*;

// ==============================================================================
// SLOT CREATION
// ==============================================================================

#[tokio::test]
async fn test_touching_slot_is_accepted() {
    let h = Harness::new();
    let d = doctor();

    h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let s2 = h.scheduling.create_slot(d, range("09:30", "10:00")).await.unwrap();

    assert_eq!(s2.doctor_id, d.person_id);
    assert_eq!(SlotStore::get_by_doctor(h.store.as_ref(), d.person_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_slot_inside_existing_slot_is_rejected() {
    let h = Harness::new();
    let d = doctor();
    h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();

    let result = h.scheduling.create_slot(d, range("09:00", "09:15")).await;
    assert_matches!(result, Err(SchedulingError::SlotOverlap));
}

#[tokio::test]
async fn test_other_doctors_and_other_days_do_not_overlap() {
    let h = Harness::new();
    let d1 = doctor();
    let d2 = doctor();
    h.scheduling.create_slot(d1, range("09:00", "09:30")).await.unwrap();

    assert_ok!(h.scheduling.create_slot(d2, range("09:00", "09:30")).await);
    let next_day = day().succ_opt().unwrap();
    assert_ok!(h.scheduling.create_slot(d1, range_on(next_day, "09:00", "09:30")).await);
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let h = Harness::new();
    let result = h.scheduling.create_slot(doctor(), range("10:00", "09:00")).await;
    assert_matches!(result, Err(SchedulingError::InvalidRange));

    assert_err!(h.scheduling.create_slot(doctor(), range("10:00", "10:00")).await);
}

#[tokio::test]
async fn test_only_doctors_manage_slots() {
    let h = Harness::new();
    let result = h.scheduling.create_slot(patient(), range("09:00", "09:30")).await;
    assert_matches!(result, Err(SchedulingError::Unauthenticated(_)));
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_patient_cannot_double_book_overlapping_time() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();

    let s1 = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let a1 = h.scheduling.book_appointment(p, s1.id).await.unwrap();
    assert_eq!(a1.status, AppointmentStatus::Scheduled);
    assert_eq!(a1.patient_id, p.person_id);

    // An overlapping slot of the same doctor cannot be created through the engine,
    // so it is seeded directly.
    let s2 = SlotStore::insert(h.store.as_ref(), Slot::new(d.person_id, range("09:15", "09:45")))
        .await
        .unwrap();

    let result = h.scheduling.book_appointment(p, s2.id).await;
    assert_matches!(result, Err(SchedulingError::PatientConflict));
}

#[tokio::test]
async fn test_patient_conflict_spans_doctors() {
    let h = Harness::new();
    let p = patient();
    let s1 = h.scheduling.create_slot(doctor(), range("09:00", "09:30")).await.unwrap();
    let s2 = h.scheduling.create_slot(doctor(), range("09:15", "09:45")).await.unwrap();
    let s3 = h.scheduling.create_slot(doctor(), range("09:30", "10:00")).await.unwrap();

    h.scheduling.book_appointment(p, s1.id).await.unwrap();
    assert_matches!(
        h.scheduling.book_appointment(p, s2.id).await,
        Err(SchedulingError::PatientConflict)
    );
    // back-to-back is fine
    h.scheduling.book_appointment(p, s3.id).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_bookings_of_one_slot_admit_exactly_one() {
    let h = Harness::new();
    let s4 = h.scheduling.create_slot(doctor(), range("11:00", "11:30")).await.unwrap();

    let (first, second) = tokio::join!(
        h.scheduling.book_appointment(patient(), s4.id),
        h.scheduling.book_appointment(patient(), s4.id),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(SchedulingError::SlotUnavailable))));

    let holders = h.store.get_by_slot(s4.id, None).await.unwrap();
    assert_eq!(holders.len(), 1);
}

#[tokio::test]
async fn test_same_patient_submitting_twice_gets_one_appointment() {
    let h = Harness::new();
    let p = patient();
    let slot = h.scheduling.create_slot(doctor(), range("11:00", "11:30")).await.unwrap();

    let (first, second) = tokio::join!(
        h.scheduling.book_appointment(p, slot.id),
        h.scheduling.book_appointment(p, slot.id),
    );

    assert!(first.is_ok());
    assert_matches!(second, Err(SchedulingError::PatientConflict));
}

#[tokio::test]
async fn test_booking_requires_patient_and_existing_slot() {
    let h = Harness::new();
    let slot = h.scheduling.create_slot(doctor(), range("09:00", "09:30")).await.unwrap();

    assert_matches!(
        h.scheduling.book_appointment(doctor(), slot.id).await,
        Err(SchedulingError::Unauthenticated(_))
    );
    assert_matches!(
        h.scheduling.book_appointment(patient(), Uuid::new_v4()).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn test_booking_pushes_appointment_created_to_doctor() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let mut doctor_rx = h.live.subscribe(d.person_id).await;
    let mut patient_rx = h.live.subscribe(p.person_id).await;

    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, slot.id).await.unwrap();

    let events = drain(&mut doctor_rx);
    assert_eq!(names(&events), vec!["AppointmentCreated"]);
    assert_eq!(events[0].payload["id"], appointment.id.to_string());
    assert!(drain(&mut patient_rx).is_empty());
}

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

#[tokio::test]
async fn test_patient_cancellation_notifies_doctor_only() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, slot.id).await.unwrap();

    let mut doctor_rx = h.live.subscribe(d.person_id).await;
    let mut patient_rx = h.live.subscribe(p.person_id).await;

    let cancelled = h
        .scheduling
        .transition_status(appointment.id, AppointmentStatus::Cancelled, p)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    assert_eq!(
        names(&drain(&mut doctor_rx)),
        vec!["NotificationReceived", "AppointmentCancelled"]
    );
    assert_eq!(names(&drain(&mut patient_rx)), vec!["NotificationReceived"]);

    let stored = AppointmentStore::get_by_id(h.store.as_ref(), appointment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_completion_notifies_without_cancellation_event() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, slot.id).await.unwrap();
    let mut patient_rx = h.live.subscribe(p.person_id).await;

    h.scheduling
        .transition_status(appointment.id, AppointmentStatus::Completed, d)
        .await
        .unwrap();

    assert_eq!(names(&drain(&mut patient_rx)), vec!["NotificationReceived"]);

    let notifications = h.store.get_by_appointment(appointment.id).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].message, "Your appointment on 01/03/2025 at 09:00 was completed.");
}

#[tokio::test]
async fn test_terminal_appointments_cannot_change() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, slot.id).await.unwrap();

    h.scheduling
        .transition_status(appointment.id, AppointmentStatus::Completed, d)
        .await
        .unwrap();

    let result = h
        .scheduling
        .transition_status(appointment.id, AppointmentStatus::Cancelled, p)
        .await;
    assert_eq!(
        result,
        Err(SchedulingError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Cancelled,
        })
    );

    // a rejected transition leaves no notification behind
    assert_eq!(h.store.get_by_appointment(appointment.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transition_requires_participant() {
    let h = Harness::new();
    let slot = h.scheduling.create_slot(doctor(), range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(patient(), slot.id).await.unwrap();

    assert_matches!(
        h.scheduling
            .transition_status(appointment.id, AppointmentStatus::Cancelled, patient())
            .await,
        Err(SchedulingError::Unauthorized)
    );
    assert_matches!(
        h.scheduling
            .transition_status(appointment.id, AppointmentStatus::Cancelled, doctor())
            .await,
        Err(SchedulingError::Unauthorized)
    );
    assert_matches!(
        h.scheduling
            .transition_status(Uuid::new_v4(), AppointmentStatus::Cancelled, patient())
            .await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn test_cancelled_slot_can_be_booked_again() {
    let h = Harness::new();
    let p1 = patient();
    let p2 = patient();
    let slot = h.scheduling.create_slot(doctor(), range("09:00", "09:30")).await.unwrap();

    let first = h.scheduling.book_appointment(p1, slot.id).await.unwrap();
    h.scheduling
        .transition_status(first.id, AppointmentStatus::Cancelled, p1)
        .await
        .unwrap();

    let second = h.scheduling.book_appointment(p2, slot.id).await.unwrap();
    assert_eq!(second.slot_id, slot.id);
}

// ==============================================================================
// SLOT EDIT
// ==============================================================================

#[tokio::test]
async fn test_edit_does_not_conflict_with_own_appointment() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, slot.id).await.unwrap();
    let mut patient_rx = h.live.subscribe(p.person_id).await;

    let edited = h
        .scheduling
        .edit_slot(slot.id, d, range("09:15", "09:45"))
        .await
        .unwrap();
    assert_eq!(edited.range(), range("09:15", "09:45"));
    assert_eq!(
        SlotStore::get_by_id(h.store.as_ref(), slot.id).await.unwrap().unwrap(),
        edited
    );

    let events = drain(&mut patient_rx);
    assert_eq!(names(&events), vec!["NotificationReceived", "SlotUpdated"]);
    assert_eq!(events[1].payload["start_time"], "09:15:00");

    let notifications = h.store.get_by_appointment(appointment.id).await.unwrap();
    assert_eq!(
        notifications[0].message,
        "Your appointment on 01/03/2025 at 09:00 was rescheduled to 01/03/2025 at 09:15."
    );
}

#[tokio::test]
async fn test_edit_onto_another_booked_slot_is_rejected() {
    let h = Harness::new();
    let d = doctor();
    let booked = h.scheduling.create_slot(d, range("10:00", "10:30")).await.unwrap();
    h.scheduling.book_appointment(patient(), booked.id).await.unwrap();
    let free = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();

    let result = h.scheduling.edit_slot(free.id, d, range("10:15", "10:45")).await;
    assert_matches!(result, Err(SchedulingError::SlotOverlap));
}

#[tokio::test]
async fn test_free_slot_may_be_moved_onto_another_free_slot() {
    let h = Harness::new();
    let d = doctor();
    h.scheduling.create_slot(d, range("10:00", "10:30")).await.unwrap();
    let free = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();

    // only booked time blocks an edit, unlike creation
    let moved = assert_ok!(h.scheduling.edit_slot(free.id, d, range("10:15", "10:45")).await);
    assert_eq!(moved.range(), range("10:15", "10:45"));
    assert_matches!(
        h.scheduling.create_slot(d, range("10:15", "10:45")).await,
        Err(SchedulingError::SlotOverlap)
    );
}

#[tokio::test]
async fn test_edit_that_double_books_patient_is_rejected() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    h.scheduling.book_appointment(p, slot.id).await.unwrap();

    let elsewhere = h.scheduling.create_slot(doctor(), range("11:00", "11:30")).await.unwrap();
    h.scheduling.book_appointment(p, elsewhere.id).await.unwrap();

    let result = h.scheduling.edit_slot(slot.id, d, range("11:15", "11:45")).await;
    assert_matches!(result, Err(SchedulingError::PatientConflict));

    // unchanged
    let stored = SlotStore::get_by_id(h.store.as_ref(), slot.id).await.unwrap().unwrap();
    assert_eq!(stored.range(), range("09:00", "09:30"));
}

#[tokio::test]
async fn test_edit_checks_ownership_and_existence() {
    let h = Harness::new();
    let d = doctor();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();

    assert_matches!(
        h.scheduling.edit_slot(slot.id, doctor(), range("10:00", "10:30")).await,
        Err(SchedulingError::NotOwner)
    );
    assert_matches!(
        h.scheduling.edit_slot(Uuid::new_v4(), d, range("10:00", "10:30")).await,
        Err(SchedulingError::NotFound(_))
    );
    assert_matches!(
        h.scheduling.edit_slot(slot.id, d, range("10:30", "10:00")).await,
        Err(SchedulingError::InvalidRange)
    );
}

// ==============================================================================
// SLOT DELETION
// ==============================================================================

#[tokio::test]
async fn test_deleting_booked_slot_cancels_its_appointment() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let s1 = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let a1 = h.scheduling.book_appointment(p, s1.id).await.unwrap();

    let mut doctor_rx = h.live.subscribe(d.person_id).await;
    let mut patient_rx = h.live.subscribe(p.person_id).await;

    let deleted = h.scheduling.delete_slot(s1.id, d).await.unwrap();
    assert_eq!(deleted.id, s1.id);

    let a1 = AppointmentStore::get_by_id(h.store.as_ref(), a1.id).await.unwrap().unwrap();
    assert_eq!(a1.status, AppointmentStatus::Cancelled);
    assert_eq!(h.store.get_by_appointment(a1.id).await.unwrap().len(), 1);
    assert!(SlotStore::get_by_id(h.store.as_ref(), s1.id).await.unwrap().is_none());

    assert_eq!(
        names(&drain(&mut patient_rx)),
        vec!["NotificationReceived", "AppointmentCancelled"]
    );
    // the deleting doctor is not told about their own cancellation
    assert_eq!(names(&drain(&mut doctor_rx)), vec!["NotificationReceived"]);
}

#[tokio::test]
async fn test_delete_checks_ownership() {
    let h = Harness::new();
    let slot = h.scheduling.create_slot(doctor(), range("09:00", "09:30")).await.unwrap();

    assert_matches!(
        h.scheduling.delete_slot(slot.id, doctor()).await,
        Err(SchedulingError::NotOwner)
    );
    assert_matches!(
        h.scheduling.delete_slot(Uuid::new_v4(), doctor()).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn test_history_outlives_deleted_slot() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, slot.id).await.unwrap();
    assert_eq!(appointment.doctor_id, d.person_id);

    h.scheduling
        .transition_status(appointment.id, AppointmentStatus::Completed, d)
        .await
        .unwrap();
    h.scheduling.delete_slot(slot.id, d).await.unwrap();

    assert_eq!(
        h.scheduling
            .transition_status(appointment.id, AppointmentStatus::Cancelled, p)
            .await,
        Err(SchedulingError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Cancelled,
        })
    );

    let history = h.scheduling.list_doctor_appointments(&d, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, AppointmentStatus::Completed);

    let seen_by_doctor = h.scheduling.get_appointment(appointment.id, &d).await.unwrap();
    assert_eq!(seen_by_doctor.id, appointment.id);
    assert_matches!(
        h.scheduling.get_appointment(appointment.id, &doctor()).await,
        Err(SchedulingError::Unauthorized)
    );
}

// ==============================================================================
// READS
// ==============================================================================

#[tokio::test]
async fn test_available_slots_exclude_held_slots() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let late = h.scheduling.create_slot(d, range("10:00", "10:30")).await.unwrap();
    let early = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let booked = h.scheduling.create_slot(d, range("11:00", "11:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, booked.id).await.unwrap();

    let available = h.scheduling.list_available_slots(d.person_id).await.unwrap();
    assert_eq!(available, vec![early.clone(), late.clone()]);

    h.scheduling
        .transition_status(appointment.id, AppointmentStatus::Cancelled, p)
        .await
        .unwrap();

    let available = h.scheduling.list_available_slots(d.person_id).await.unwrap();
    assert_eq!(available, vec![early, late, booked]);
}

#[tokio::test]
async fn test_slot_is_visible_to_its_owner_only() {
    let h = Harness::new();
    let d = doctor();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();

    assert_eq!(h.scheduling.get_slot(slot.id, &d).await.unwrap(), slot);
    // second read comes from the cache and is still guarded
    assert_matches!(
        h.scheduling.get_slot(slot.id, &doctor()).await,
        Err(SchedulingError::NotOwner)
    );
    assert_matches!(
        h.scheduling.get_slot(Uuid::new_v4(), &d).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn test_appointment_reads_are_limited_to_participants() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let appointment = h.scheduling.book_appointment(p, slot.id).await.unwrap();

    assert_eq!(h.scheduling.get_appointment(appointment.id, &p).await.unwrap(), appointment);
    assert_eq!(h.scheduling.get_appointment(appointment.id, &d).await.unwrap(), appointment);
    assert_matches!(
        h.scheduling.get_appointment(appointment.id, &patient()).await,
        Err(SchedulingError::Unauthorized)
    );
    assert_matches!(
        h.scheduling.list_notifications(appointment.id, &doctor()).await,
        Err(SchedulingError::Unauthorized)
    );
}

#[tokio::test]
async fn test_appointment_lists_follow_status_changes() {
    let h = Harness::new();
    let d = doctor();
    let p = patient();
    let s1 = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();
    let s2 = h.scheduling.create_slot(d, range("10:00", "10:30")).await.unwrap();
    let a1 = h.scheduling.book_appointment(p, s1.id).await.unwrap();
    h.scheduling.book_appointment(p, s2.id).await.unwrap();

    let scheduled = h
        .scheduling
        .list_patient_appointments(&p, Some(AppointmentStatus::Scheduled))
        .await
        .unwrap();
    assert_eq!(scheduled.len(), 2);
    assert!(h
        .scheduling
        .list_doctor_appointments(&d, Some(AppointmentStatus::Completed))
        .await
        .unwrap()
        .is_empty());

    h.scheduling
        .transition_status(a1.id, AppointmentStatus::Completed, d)
        .await
        .unwrap();

    let scheduled = h
        .scheduling
        .list_patient_appointments(&p, Some(AppointmentStatus::Scheduled))
        .await
        .unwrap();
    assert_eq!(scheduled.len(), 1);
    let completed = h
        .scheduling
        .list_doctor_appointments(&d, Some(AppointmentStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, a1.id);

    let notifications = h.scheduling.list_notifications(a1.id, &p).await.unwrap();
    assert_eq!(notifications.len(), 1);

    assert_matches!(
        h.scheduling.list_patient_appointments(&d, None).await,
        Err(SchedulingError::Unauthenticated(_))
    );
}

// ==============================================================================
// INVARIANTS UNDER CONTENTION
// ==============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invariants_hold_under_concurrent_bookings() {
    let h = Harness::new();
    let d1 = doctor();
    let d2 = doctor();

    let mut slots = Vec::new();
    for (d, start, end) in [
        (d1, "09:00", "09:30"),
        (d1, "09:30", "10:00"),
        (d1, "10:00", "10:30"),
        (d2, "09:15", "09:45"),
        (d2, "09:45", "10:15"),
    ] {
        slots.push(h.scheduling.create_slot(d, range(start, end)).await.unwrap());
    }
    let patients: Vec<_> = (0..6).map(|_| patient()).collect();

    let mut tasks = Vec::new();
    for p in &patients {
        for slot in &slots {
            let scheduling = h.scheduling.clone();
            let (p, slot_id) = (*p, slot.id);
            tasks.push(tokio::spawn(async move { scheduling.book_appointment(p, slot_id).await }));
        }
    }
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => {}
            Err(e) => assert!(e.is_conflict(), "unexpected failure: {}", e),
        }
    }

    let ranges: HashMap<Uuid, _> = slots.iter().map(|s| (s.id, s.range())).collect();

    for slot in &slots {
        let holders = h.store.get_by_slot(slot.id, None).await.unwrap();
        assert!(holders.iter().filter(|a| a.status.holds_slot()).count() <= 1);
    }

    for p in &patients {
        let held: Vec<_> = h
            .store
            .get_by_patient(p.person_id, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.status.holds_slot())
            .map(|a| ranges[&a.slot_id])
            .collect();
        for (i, a) in held.iter().enumerate() {
            for b in &held[i + 1..] {
                assert!(!a.overlaps(b), "patient {} double-booked", p.person_id);
            }
        }
    }
}

#[tokio::test]
async fn test_mutations_fail_once_queue_is_shut_down() {
    let h = Harness::new();
    let d = doctor();
    let slot = h.scheduling.create_slot(d, range("09:00", "09:30")).await.unwrap();

    h.scheduling.queue().shutdown().await.unwrap();

    assert_matches!(
        h.scheduling.create_slot(d, range("10:00", "10:30")).await,
        Err(SchedulingError::Queue(_))
    );
    // reads bypass the queue
    assert_eq!(h.scheduling.list_available_slots(d.person_id).await.unwrap(), vec![slot]);
}
