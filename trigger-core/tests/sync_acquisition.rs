use trigger_core::telemetry::DecoderEvent;
use trigger_core::{MissingToothDecoder, SyncStatus, ToothOutcome, ToothVerdict, TriggerConfig};

const PITCH: u32 = 1_000;

fn wheel(teeth: u16, missing: u16) -> MissingToothDecoder {
    MissingToothDecoder::new(TriggerConfig::missing_tooth(teeth, missing)).expect("valid wheel")
}

/// Feeds every present tooth from `start` at a steady pitch, then closes the gap.
/// Returns the timestamp of the tooth-one edge that closed it.
fn acquire(decoder: &mut MissingToothDecoder, teeth_present: u32, start: u32) -> u32 {
    let mut now = start;
    decoder.on_tooth_edge(now);
    for _ in 1..teeth_present {
        now = now.wrapping_add(PITCH);
        decoder.on_tooth_edge(now);
    }
    now = now.wrapping_add(2 * PITCH);
    decoder.on_tooth_edge(now);
    now
}

/// Feeds teeth 2..=N-M after `tooth_one` and the following gap.
fn spin(decoder: &mut MissingToothDecoder, teeth_present: u32, tooth_one: u32) -> u32 {
    let mut now = tooth_one;
    for _ in 1..teeth_present {
        now = now.wrapping_add(PITCH);
        decoder.on_tooth_edge(now);
    }
    now = now.wrapping_add(2 * PITCH);
    decoder.on_tooth_edge(now);
    now
}

#[test]
fn twelve_minus_one_reaches_half_then_full_sync() {
    let mut decoder = wheel(12, 1);
    let tooth_one = acquire(&mut decoder, 11, 1_000);
    assert_eq!(tooth_one, 13_000);
    assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
    assert_eq!(decoder.state().tooth_one_time(), 13_000);

    let tooth_one = spin(&mut decoder, 11, tooth_one);
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
    assert_eq!(decoder.revolution_count(), 1);
    assert_eq!(decoder.state().tooth_one_time_minus_one(), 13_000);
    assert_eq!(decoder.state().revolution_time_micros(), 12_000);
    assert_eq!(decoder.rpm(), 5_000);

    spin(&mut decoder, 11, tooth_one);
    assert_eq!(decoder.revolution_count(), 2);
    assert_eq!(decoder.sync_loss_count(), 0);

    let events: Vec<DecoderEvent> = decoder
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        events,
        vec![DecoderEvent::SyncAcquired, DecoderEvent::SyncPromoted]
    );
}

#[test]
fn thirteen_minus_one_reports_tooth_one_speed() {
    let mut decoder = wheel(13, 1);
    let tooth_one = acquire(&mut decoder, 12, 1_000);
    assert_eq!(tooth_one, 14_000);
    assert_eq!(decoder.rpm(), 4_615);

    spin(&mut decoder, 12, tooth_one);
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
    assert_eq!(decoder.state().revolution_time_micros(), 13_000);
    assert_eq!(decoder.rpm(), 4_615);
}

#[test]
fn gap_is_only_accepted_where_it_is_due() {
    let mut decoder = wheel(12, 1);
    let tooth_one = acquire(&mut decoder, 11, 1_000);
    let outcome = decoder.on_tooth_edge(tooth_one + 2 * PITCH);
    assert_eq!(outcome, ToothOutcome::Accepted(ToothVerdict::Anomaly));
    assert_eq!(decoder.sync_loss_count(), 1);
    assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
}

#[test]
fn anomaly_blocks_promotion_until_a_clean_revolution() {
    let mut decoder = wheel(12, 1);
    let tooth_one = acquire(&mut decoder, 11, 1_000);

    // Extra pulse partway through tooth 2's interval.
    let mut now = tooth_one + PITCH;
    decoder.on_tooth_edge(now);
    decoder.on_tooth_edge(now + 300);
    for _ in 0..9 {
        now += PITCH;
        decoder.on_tooth_edge(now);
    }
    now += 2 * PITCH;
    decoder.on_tooth_edge(now);
    assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
    assert_eq!(decoder.sync_loss_count(), 1);

    spin(&mut decoder, 11, now);
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
}

#[test]
fn extra_pulse_keeps_position_and_speed() {
    let mut decoder = wheel(12, 1);
    let tooth_one = acquire(&mut decoder, 11, 1_000);
    let tooth_one = spin(&mut decoder, 11, tooth_one);

    let tooth_two = tooth_one + PITCH;
    decoder.on_tooth_edge(tooth_two);
    let outcome = decoder.on_tooth_edge(tooth_two + 300);
    assert_eq!(outcome, ToothOutcome::Accepted(ToothVerdict::Anomaly));
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
    assert_eq!(decoder.state().tooth_index(), 2);
    assert_eq!(decoder.state().last_tooth_time(), tooth_two);
    assert_eq!(decoder.crank_angle(tooth_two + 300), 39_000);
    assert!(!decoder.state().tooth_angle_is_corrected());

    let outcome = decoder.on_tooth_edge(tooth_two + PITCH);
    assert_eq!(outcome, ToothOutcome::Accepted(ToothVerdict::Tooth));
    assert_eq!(decoder.state().tooth_index(), 3);
    assert_eq!(decoder.crank_angle(tooth_two + PITCH), 60_000);
    assert_eq!(decoder.rpm(), 5_000);
}

#[test]
fn extra_pulse_late_in_a_pitch_costs_one_loss() {
    let mut decoder = wheel(12, 1);
    let tooth_one = acquire(&mut decoder, 11, 1_000);
    let tooth_one = spin(&mut decoder, 11, tooth_one);
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);

    // Extra edge 40% into the pitch after tooth 7.
    let tooth_seven = tooth_one + 6 * PITCH;
    let mut now = tooth_one;
    while now < tooth_seven {
        now += PITCH;
        decoder.on_tooth_edge(now);
    }
    let outcome = decoder.on_tooth_edge(tooth_seven + 400);
    assert_eq!(outcome, ToothOutcome::Accepted(ToothVerdict::Anomaly));
    assert_eq!(decoder.sync_loss_count(), 1);

    for tooth in 8..=11u16 {
        now += PITCH;
        let outcome = decoder.on_tooth_edge(now);
        assert_eq!(outcome, ToothOutcome::Accepted(ToothVerdict::Tooth));
        assert_eq!(decoder.state().tooth_index(), tooth);
    }
    now += 2 * PITCH;
    let outcome = decoder.on_tooth_edge(now);
    assert_eq!(outcome, ToothOutcome::Accepted(ToothVerdict::MissingToothGap));
    assert_eq!(decoder.state().tooth_index(), 1);

    for tooth in 2..=5u16 {
        now += PITCH;
        decoder.on_tooth_edge(now);
        assert_eq!(decoder.state().tooth_index(), tooth);
    }
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
    assert_eq!(decoder.sync_loss_count(), 1);
    assert_eq!(decoder.rpm(), 5_000);
}

#[test]
fn extra_pulse_accepted_as_a_tooth_is_merged_with_the_real_one() {
    for early in [500, 600, 700, 800] {
        let mut decoder = wheel(12, 1);
        let tooth_one = acquire(&mut decoder, 11, 1_000);
        let tooth_one = spin(&mut decoder, 11, tooth_one);

        let tooth_four = tooth_one + 3 * PITCH;
        let mut now = tooth_one;
        while now < tooth_four {
            now += PITCH;
            decoder.on_tooth_edge(now);
        }
        decoder.on_tooth_edge(tooth_four + early);

        let tooth_five = tooth_four + PITCH;
        let outcome = decoder.on_tooth_edge(tooth_five);
        assert_eq!(
            outcome,
            ToothOutcome::Accepted(ToothVerdict::Anomaly),
            "pulse at {early}"
        );
        assert_eq!(decoder.state().tooth_index(), 5, "pulse at {early}");
        assert_eq!(decoder.crank_angle(tooth_five), 120_000, "pulse at {early}");
        assert_eq!(decoder.state().last_tooth_time_minus_one(), tooth_four);
        assert_eq!(decoder.sync_loss_count(), 1, "pulse at {early}");

        now = tooth_five;
        for _ in 6..=11 {
            now += PITCH;
            decoder.on_tooth_edge(now);
        }
        now += 2 * PITCH;
        decoder.on_tooth_edge(now);
        assert_eq!(decoder.state().tooth_index(), 1, "pulse at {early}");
        assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
        assert_eq!(decoder.sync_loss_count(), 1, "pulse at {early}");
    }
}

#[test]
fn noise_inside_the_gap_is_not_taken_for_tooth_one() {
    for early in [400, 600, 1_200] {
        let mut decoder = wheel(12, 1);
        let tooth_one = acquire(&mut decoder, 11, 1_000);
        let tooth_one = spin(&mut decoder, 11, tooth_one);

        let tooth_eleven = tooth_one + 10 * PITCH;
        let mut now = tooth_one;
        while now < tooth_eleven {
            now += PITCH;
            decoder.on_tooth_edge(now);
        }
        decoder.on_tooth_edge(tooth_eleven + early);
        assert_eq!(decoder.state().last_tooth_time(), tooth_eleven, "pulse at {early}");

        let outcome = decoder.on_tooth_edge(tooth_eleven + 2 * PITCH);
        assert_eq!(
            outcome,
            ToothOutcome::Accepted(ToothVerdict::MissingToothGap),
            "pulse at {early}"
        );
        assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
        assert_eq!(decoder.sync_loss_count(), 1, "pulse at {early}");
    }
}

#[test]
fn dropped_tooth_next_to_the_gap_lands_on_the_right_tooth() {
    // Tooth 11 missing: the edge after tooth 10 is tooth one.
    let mut decoder = wheel(12, 1);
    let tooth_one = acquire(&mut decoder, 11, 1_000);
    let tooth_one = spin(&mut decoder, 11, tooth_one);
    let mut now = tooth_one;
    for _ in 2..=10 {
        now += PITCH;
        decoder.on_tooth_edge(now);
    }
    now += 3 * PITCH;
    decoder.on_tooth_edge(now);
    assert_eq!(decoder.state().tooth_index(), 1);
    assert_eq!(decoder.crank_angle(now), 0);
    spin(&mut decoder, 11, now);
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
    assert_eq!(decoder.state().tooth_index(), 1);
    assert_eq!(decoder.sync_loss_count(), 1);

    // Tooth one missing: the edge after tooth 11 is tooth 2.
    let mut decoder = wheel(12, 1);
    let tooth_one = acquire(&mut decoder, 11, 1_000);
    let tooth_one = spin(&mut decoder, 11, tooth_one);
    let mut now = tooth_one;
    for _ in 2..=11 {
        now += PITCH;
        decoder.on_tooth_edge(now);
    }
    now += 3 * PITCH;
    decoder.on_tooth_edge(now);
    assert_eq!(decoder.state().tooth_index(), 2);
    assert_eq!(decoder.crank_angle(now), 30_000);
    for _ in 3..=11 {
        now += PITCH;
        decoder.on_tooth_edge(now);
    }
    now += 2 * PITCH;
    decoder.on_tooth_edge(now);
    assert_eq!(decoder.state().tooth_index(), 1);
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
    assert_eq!(decoder.sync_loss_count(), 1);
}

#[test]
fn sync_loss_count_never_decreases() {
    let config = TriggerConfig::missing_tooth(12, 1).with_max_consecutive_anomalies(0);
    let mut decoder = MissingToothDecoder::new(config).expect("valid wheel");
    let mut previous = 0;
    let mut now = 1_000;

    for round in 0..6u32 {
        now = acquire(&mut decoder, 11, now + PITCH);
        now = spin(&mut decoder, 11, now);
        // Every other round, a burst of noise knocks the decoder out of sync.
        if round % 2 == 0 {
            now += 5 * PITCH;
            decoder.on_tooth_edge(now);
        } else {
            decoder.reset_decoder(now);
        }
        assert!(decoder.sync_loss_count() >= previous);
        previous = decoder.sync_loss_count();
    }
    assert_eq!(decoder.sync_loss_count(), 6);
}

#[test]
fn timestamps_wrap_transparently() {
    let mut decoder = wheel(12, 1);
    let start = u32::MAX - 4_500;
    let tooth_one = acquire(&mut decoder, 11, start);
    assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
    assert!(tooth_one < start);

    spin(&mut decoder, 11, tooth_one);
    assert_eq!(decoder.sync_status(), SyncStatus::FullSync);
    assert_eq!(decoder.rpm(), 5_000);
}

#[test]
fn thirty_six_minus_two_needs_a_triple_gap() {
    let mut decoder = wheel(36, 2);
    let mut now = 1_000;
    for _ in 0..34 {
        decoder.on_tooth_edge(now);
        now += PITCH;
    }
    // A double pitch is not this wheel's gap.
    now += PITCH;
    decoder.on_tooth_edge(now);
    assert_eq!(decoder.sync_status(), SyncStatus::Unsynced);

    let mut decoder = wheel(36, 2);
    let mut now = 1_000;
    for _ in 0..34 {
        decoder.on_tooth_edge(now);
        now += PITCH;
    }
    decoder.on_tooth_edge(now + 2 * PITCH);
    assert_eq!(decoder.sync_status(), SyncStatus::HalfSync);
    assert_eq!(decoder.state().current_tooth_angle_millidegrees(), 30_000);
    assert_eq!(decoder.rpm(), 1_666);
}
