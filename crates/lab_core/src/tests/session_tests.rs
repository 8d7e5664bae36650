use super::*;
use crate::catalog::known_chemicals;
use proptest::prelude::*;

const FAST: Duration = Duration::from_millis(20);

fn session() -> ExperimentSession {
    ExperimentSession::new(ReactionCatalog::standard()).with_settle_delay(FAST)
}

fn chem(name: &str) -> ChemicalName {
    ChemicalName::from(name)
}

fn select(session: &mut ExperimentSession, names: &[&str]) {
    for name in names {
        session.toggle_chemical(chem(name)).expect("toggle");
    }
}

#[test]
fn new_session_starts_empty_at_room_temperature() {
    let snapshot = session().snapshot();
    assert!(snapshot.selected_chemicals.is_empty());
    assert_eq!(snapshot.flask_stage, FlaskStage::Empty);
    assert_eq!(snapshot.active_reaction, None);
    assert_eq!(snapshot.progress, 0);
    assert_eq!(snapshot.temperature, DEFAULT_TEMPERATURE);
}

#[test]
fn stage_tracks_selection_count() {
    let mut session = session();
    assert_eq!(
        session.toggle_chemical(chem("Ammonia")).expect("toggle"),
        FlaskStage::OneChemical
    );
    assert_eq!(
        session.toggle_chemical(chem("Copper Sulfate")).expect("toggle"),
        FlaskStage::TwoChemicalsSelected
    );
    assert_eq!(
        session.toggle_chemical(chem("Ammonia")).expect("toggle"),
        FlaskStage::OneChemical
    );
    assert_eq!(
        session.toggle_chemical(chem("Copper Sulfate")).expect("toggle"),
        FlaskStage::Empty
    );
}

#[test]
fn third_chemical_is_rejected_without_changing_the_flask() {
    let mut session = session();
    select(&mut session, &["Ammonia", "Copper Sulfate"]);
    let before = session.snapshot();

    let err = session
        .toggle_chemical(chem("Silver Nitrate"))
        .expect_err("third chemical");
    assert!(matches!(err, LabError::InvalidSelection(_)));
    assert_eq!(session.snapshot(), before);
}

#[test]
fn temperature_outside_bench_range_is_rejected() {
    let mut session = session();
    session.set_temperature(45.0).expect("in range");
    assert!(matches!(
        session.set_temperature(61.0),
        Err(LabError::TemperatureOutOfRange(_))
    ));
    assert!(matches!(
        session.set_temperature(f64::NAN),
        Err(LabError::TemperatureOutOfRange(_))
    ));
    assert_eq!(session.snapshot().temperature, 45.0);
}

#[test]
fn warmer_flask_reacts_faster() {
    assert!(estimated_reaction_time(60.0) < estimated_reaction_time(20.0));
}

#[test]
fn mix_needs_exactly_two_chemicals() {
    let mut session = session();
    select(&mut session, &["Ammonia"]);
    let before = session.snapshot();
    let err = session.mix().expect_err("one chemical");
    assert!(matches!(err, LabError::InvalidSelection(_)));
    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn peroxide_and_iodide_react_after_settling() {
    let mut session = session();
    select(&mut session, &["Hydrogen Peroxide", "Potassium Iodide"]);

    let pending = session.mix().expect("mix");
    assert_eq!(session.stage(), FlaskStage::Mixing);
    assert_eq!(pending.reaction_id(), "Hydrogen Peroxide+Potassium Iodide");
    assert_eq!(session.snapshot().active_reaction, None);

    let reaction = pending.settled().await.expect("settled");
    let snapshot = session.snapshot();
    assert_eq!(snapshot.flask_stage, FlaskStage::Reacted);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(snapshot.active_reaction.as_ref(), Some(&reaction));
    assert!(snapshot.equation().contains("H2O2"));
    assert!(snapshot.observation().contains("effervescence"));
}

#[tokio::test]
async fn unknown_pair_empties_the_flask() {
    let mut session = session();
    select(&mut session, &["Sodium Thiosulfate", "Ammonia"]);

    let err = session.mix().expect_err("no such reaction");
    assert!(matches!(err, LabError::UnrecognizedReaction { .. }));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.flask_stage, FlaskStage::Empty);
    assert!(snapshot.selected_chemicals.is_empty());
}

#[tokio::test]
async fn second_mix_while_mixing_is_rejected_and_changes_nothing() {
    let mut session = session();
    select(&mut session, &["Silver Nitrate", "Sodium Chloride"]);
    let pending = session.mix().expect("mix");
    let during = session.snapshot();

    let err = session.mix().expect_err("already mixing");
    assert!(matches!(err, LabError::ConcurrentMix));
    assert_eq!(session.snapshot(), during);

    assert!(pending.settled().await.is_some());
    assert_eq!(session.stage(), FlaskStage::Reacted);
}

#[tokio::test]
async fn mixing_again_after_reaction_is_rejected() {
    let mut session = session();
    select(&mut session, &["Lead(II) Nitrate", "Potassium Iodide"]);
    session.mix().expect("mix").settled().await.expect("settled");

    let err = session.mix().expect_err("already reacted");
    assert!(matches!(err, LabError::AlreadyReacted));
    assert_eq!(session.stage(), FlaskStage::Reacted);
}

#[tokio::test]
async fn changing_selection_while_mixing_cancels_the_reaction() {
    let mut session = session();
    select(&mut session, &["Iron(III) Chloride", "Potassium Thiocyanate"]);
    let pending = session.mix().expect("mix");

    session
        .toggle_chemical(chem("Potassium Thiocyanate"))
        .expect("toggle");
    assert_eq!(pending.settled().await, None);

    tokio::time::sleep(FAST * 3).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.flask_stage, FlaskStage::OneChemical);
    assert_eq!(snapshot.active_reaction, None);
}

#[tokio::test]
async fn dropping_the_session_discards_the_pending_mix() {
    let mut session = session();
    select(&mut session, &["Copper Sulfate", "Ammonia"]);
    let pending = session.mix().expect("mix");
    drop(session);

    assert_eq!(pending.settled().await, None);
}

#[tokio::test]
async fn reset_cancels_and_empties() {
    let mut session = session();
    select(&mut session, &["Copper Sulfate", "Ammonia"]);
    let pending = session.mix().expect("mix");
    session.reset();

    assert_eq!(pending.settled().await, None);
    assert_eq!(session.stage(), FlaskStage::Empty);
}

#[tokio::test]
async fn selection_change_after_reaction_clears_the_result() {
    let mut session = session();
    select(&mut session, &["Sodium Thiosulfate", "Hydrochloric Acid"]);
    session.mix().expect("mix").settled().await.expect("settled");

    session.toggle_chemical(chem("Hydrochloric Acid")).expect("toggle");
    session.toggle_chemical(chem("Hydrochloric Acid")).expect("toggle");
    let snapshot = session.snapshot();
    assert_eq!(snapshot.flask_stage, FlaskStage::TwoChemicalsSelected);
    assert_eq!(snapshot.active_reaction, None);
    assert_eq!(snapshot.progress, 0);
    assert_eq!(snapshot.equation(), "");

    let again = session.mix().expect("mix again");
    assert!(again.settled().await.is_some());
}

fn sorted(mut names: Vec<ChemicalName>) -> Vec<ChemicalName> {
    names.sort();
    names
}

proptest! {
    #[test]
    fn prop_stage_depends_only_on_selection_count(picks in prop::collection::vec(0usize..11, 0..24)) {
        let chemicals: Vec<ChemicalName> = known_chemicals().collect();
        let mut session = session();
        for pick in picks {
            let _ = session.toggle_chemical(chemicals[pick].clone());
            let snapshot = session.snapshot();
            prop_assert!(snapshot.selected_chemicals.len() <= 2);
            prop_assert_eq!(
                snapshot.flask_stage,
                FlaskStage::for_selection_count(snapshot.selected_chemicals.len())
            );
        }
    }

    #[test]
    fn prop_double_toggle_restores_selection(
        setup in prop::collection::vec(0usize..11, 0..6),
        pick in 0usize..11,
    ) {
        let chemicals: Vec<ChemicalName> = known_chemicals().collect();
        let mut session = session();
        for index in setup {
            let _ = session.toggle_chemical(chemicals[index].clone());
        }
        let before = session.snapshot();

        let first = session.toggle_chemical(chemicals[pick].clone());
        if first.is_ok() {
            session.toggle_chemical(chemicals[pick].clone()).expect("undo toggle");
        }
        let after = session.snapshot();

        prop_assert_eq!(
            sorted(after.selected_chemicals),
            sorted(before.selected_chemicals)
        );
        prop_assert_eq!(after.flask_stage, before.flask_stage);
    }
}
