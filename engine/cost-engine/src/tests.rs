//! Scenario and property tests for the cost allocation engine

use crate::{
    compute_summaries, CostCalculator, CouponAssignment, CourtFee, Decimal, Game, GameResult,
    LiveSession, PaidLedger, RawFeeConfig, SessionConfig, Slot, SlotEntry, Tally,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

fn example_games() -> Vec<Game> {
    vec![Game::doubles(["P1", "P2"], ["P3", "P4"], 3, GameResult::TeamA)]
}

fn example_config() -> RawFeeConfig {
    RawFeeConfig::new()
        .with_total_court_fee(Decimal::from(100))
        .with_shuttle_price(Decimal::from(5))
        .with_organizer_fee(Decimal::from(20))
}

fn coupon_for(member: &str, amount: i64) -> CouponAssignment {
    CouponAssignment {
        coupon_id: format!("C-{member}"),
        discount_amount: Decimal::from(amount),
        member_name: member.to_string(),
    }
}

#[test]
fn test_end_to_end_four_players_one_game() {
    let summary =
        compute_summaries(&example_games(), &example_config(), &[], &PaidLedger::new(), &[]);

    assert_eq!(summary.len(), 4);
    for player in summary.players() {
        assert_eq!(player.court_share, Decimal::from(25));
        assert_eq!(player.shuttle_cost, Decimal::from(15));
        assert_eq!(player.organizer_share, Decimal::from(20));
        assert_eq!(player.raw_total(), Decimal::from(60));
        assert_eq!(player.total, Decimal::from(60));
        assert_eq!(player.games_played, 1);
        assert_eq!(player.shuttles_used, 3);
        assert!(!player.is_paid);
    }
    for winner in ["P1", "P2"] {
        let p = summary.get(winner).unwrap();
        assert_eq!((p.wins, p.score), (1, 2));
    }
    for loser in ["P3", "P4"] {
        let p = summary.get(loser).unwrap();
        assert_eq!((p.wins, p.score), (0, 0));
    }
    assert_eq!(summary.grand_total(), Decimal::from(240));
}

#[test]
fn test_empty_games_yield_empty_summary_for_any_config() {
    let configs = [
        example_config(),
        RawFeeConfig::new(),
        example_config().without_court_fee(),
        RawFeeConfig::new().with_per_game_court_fee(Decimal::from(10)),
    ];
    for raw in &configs {
        let summary = compute_summaries(&[], raw, &[], &PaidLedger::new(), &[]);
        assert!(summary.is_empty());
        assert_eq!(summary.grand_total(), Decimal::ZERO);
    }
}

#[test]
fn test_coupon_example() {
    let coupons = vec![coupon_for("P1", 30)];
    let summary =
        compute_summaries(&example_games(), &example_config(), &coupons, &PaidLedger::new(), &[]);

    let p1 = summary.get("P1").unwrap();
    assert_eq!(p1.total, Decimal::from(30));
    assert_eq!(p1.discount.as_ref().map(|d| d.amount), Some(Decimal::from(30)));
    for other in ["P2", "P3", "P4"] {
        assert_eq!(summary.get(other).unwrap().total, Decimal::from(60));
        assert!(summary.get(other).unwrap().discount.is_none());
    }
    assert_eq!(summary.grand_total(), Decimal::from(210));
}

#[test]
fn test_only_first_coupon_for_a_member_applies() {
    let coupons = vec![coupon_for("P1", 30), coupon_for("P1", 25)];
    let summary =
        compute_summaries(&example_games(), &example_config(), &coupons, &PaidLedger::new(), &[]);
    assert_eq!(summary.get("P1").unwrap().total, Decimal::from(30));
}

#[test]
fn test_switching_court_mode_leaves_no_trace() {
    let games = vec![
        Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::TeamA),
        Game::doubles(["P1", "P5"], ["P3", "P6"], 1, GameResult::Draw),
    ];
    let base = example_config().without_court_fee();

    let total = compute_summaries(
        &games,
        &base.clone().with_total_court_fee(Decimal::from(120)),
        &[],
        &PaidLedger::new(),
        &[],
    );
    assert!(total.players().all(|p| p.court_share == Decimal::from(20)));

    let per_game = compute_summaries(
        &games,
        &base.clone().with_per_game_court_fee(Decimal::from(15)),
        &[],
        &PaidLedger::new(),
        &[],
    );
    for player in per_game.players() {
        assert_eq!(player.court_share, Decimal::from(15 * player.games_played));
    }

    let fixed = compute_summaries(
        &games,
        &base.with_fixed_per_person_court_fee(Decimal::new(333, 1)),
        &[],
        &PaidLedger::new(),
        &[],
    );
    assert!(fixed.players().all(|p| p.court_share == Decimal::from(34)));
}

#[test]
fn test_toggle_paid_round_trip_changes_nothing_else() {
    let mut summary =
        compute_summaries(&example_games(), &example_config(), &[], &PaidLedger::new(), &[]);
    let before = summary.clone();

    assert_eq!(summary.toggle_paid("P3"), Some(true));
    assert!(summary.get("P3").unwrap().is_paid);
    assert_eq!(summary.toggle_paid("P3"), Some(false));
    assert_eq!(summary, before);
}

#[test]
fn test_oversized_amounts_yield_empty_summary() {
    let mut huge_shuttle = example_config();
    huge_shuttle.shuttle_price = json!("79228162514264337593543950335");
    let config = SessionConfig::parse(&huge_shuttle).unwrap();
    let summary = compute_summaries(&example_games(), &huge_shuttle, &[], &PaidLedger::new(), &[]);
    assert!(summary.is_empty());

    // Every share fits, the grand total does not
    let mut huge_court = RawFeeConfig::new()
        .with_shuttle_price(Decimal::ZERO)
        .with_organizer_fee(Decimal::ZERO);
    huge_court.fixed_per_person_court_fee = json!("30000000000000000000000000000");
    let summary = compute_summaries(&example_games(), &huge_court, &[], &PaidLedger::new(), &[]);
    assert!(summary.is_empty());

    let mut live = LiveSession::new();
    live.open().unwrap();
    live.add_game(example_games().remove(0)).unwrap();
    let totals = live.running_totals(Some(&config));
    assert_eq!(totals.shuttles_used, 3);
    assert_eq!(totals.shuttle_cost, None);
    assert_eq!(totals.court_cost, Some(Decimal::from(100)));
}

#[test]
fn test_tallies_saturate() {
    let mut tally = Tally { games_played: 1, shuttles_used: u32::MAX - 1, wins: 0, score: 0 };
    tally.add(Tally { games_played: 1, shuttles_used: 5, wins: 1, score: 2 });
    assert_eq!(tally.shuttles_used, u32::MAX);
    assert_eq!(tally.games_played, 2);
}

#[test]
fn test_live_session_agrees_with_batch_engine() {
    let mut live = LiveSession::new();
    live.open().unwrap();
    live.add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::Unset)).unwrap();
    live.add_game(Game::doubles(["P1", "P3"], ["P2", "P4"], 4, GameResult::Unset)).unwrap();
    live.set_result(0, GameResult::TeamB).unwrap();
    live.set_result(1, GameResult::Draw).unwrap();
    live.set_player(1, Slot::B2, Some(SlotEntry::new("P5").with_level("N"))).unwrap();

    let config = live.close(&example_config()).unwrap();
    let summary = CostCalculator::new(config).compute(live.games(), &[], &PaidLedger::new(), &[]);

    assert_eq!(summary.len(), live.tallies().len());
    for player in summary.players() {
        assert_eq!(&player.tally(), live.tally(&player.name).unwrap());
    }
    assert_eq!(summary.get("P5").unwrap().level.as_deref(), Some("N"));
}

const NAMES: [&str; 6] = ["Nok", "Bee", "Tan", "Pim", "Ton", "Fah"];

fn arb_result() -> impl Strategy<Value = GameResult> {
    prop_oneof![
        Just(GameResult::TeamA),
        Just(GameResult::TeamB),
        Just(GameResult::Draw),
        Just(GameResult::Unset),
    ]
}

fn arb_game() -> impl Strategy<Value = Game> {
    (
        proptest::collection::vec(proptest::option::of(0..NAMES.len()), 4),
        0u32..12,
        arb_result(),
    )
        .prop_map(|(slots, shuttles_used, result)| {
            let entry = |i: usize| slots[i].map(|n| SlotEntry::new(NAMES[n]));
            Game {
                a1: entry(0),
                a2: entry(1),
                b1: entry(2),
                b2: entry(3),
                shuttles_used,
                result,
            }
        })
}

#[derive(Debug, Clone)]
enum Edit {
    Result(usize, GameResult),
    Shuttles(usize, u32),
    Player(usize, Slot, Option<usize>),
    Remove(usize),
    Add(Game),
}

fn arb_slot() -> impl Strategy<Value = Slot> {
    prop_oneof![Just(Slot::A1), Just(Slot::A2), Just(Slot::B1), Just(Slot::B2)]
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..8, arb_result()).prop_map(|(i, r)| Edit::Result(i, r)),
        (0usize..8, 0u32..6).prop_map(|(i, n)| Edit::Shuttles(i, n)),
        (0usize..8, arb_slot(), proptest::option::of(0..NAMES.len()))
            .prop_map(|(i, slot, name)| Edit::Player(i, slot, name)),
        (0usize..8).prop_map(Edit::Remove),
        arb_game().prop_map(Edit::Add),
    ]
}

fn apply_edit(live: &mut LiveSession, edit: Edit) {
    let len = live.games().len();
    match edit {
        Edit::Add(game) => {
            live.add_game(game).unwrap();
        }
        _ if len == 0 => {}
        Edit::Result(i, result) => live.set_result(i % len, result).unwrap(),
        Edit::Shuttles(i, n) => live.set_shuttles(i % len, n).unwrap(),
        Edit::Player(i, slot, name) => {
            live.set_player(i % len, slot, name.map(|n| SlotEntry::new(NAMES[n]))).unwrap()
        }
        Edit::Remove(i) => {
            live.remove_game(i % len).unwrap();
        }
    }
}

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..50_000, 0u32..3).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn arb_config() -> impl Strategy<Value = SessionConfig> {
    let court = prop_oneof![
        arb_amount().prop_map(CourtFee::Total),
        arb_amount().prop_map(CourtFee::PerGame),
        arb_amount().prop_map(CourtFee::FixedPerPerson),
    ];
    (court, arb_amount(), arb_amount())
        .prop_map(|(court_fee, shuttle_price, organizer_fee)| {
            SessionConfig::new(court_fee, shuttle_price, organizer_fee)
        })
}

fn arb_coupons() -> impl Strategy<Value = Vec<CouponAssignment>> {
    proptest::collection::vec((0..NAMES.len(), 0i64..2_000), 0..4).prop_map(|picks| {
        picks
            .into_iter()
            .map(|(n, amount)| coupon_for(NAMES[n], amount))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_compute_is_deterministic(
        games in proptest::collection::vec(arb_game(), 0..8),
        config in arb_config(),
        coupons in arb_coupons(),
    ) {
        let calc = CostCalculator::new(config);
        let first = calc.compute(&games, &coupons, &PaidLedger::new(), &[]);
        let second = calc.compute(&games, &coupons, &PaidLedger::new(), &[]);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_shuttle_cost_is_conserved_within_rounding(
        games in proptest::collection::vec(arb_game(), 1..8),
        config in arb_config(),
    ) {
        let summary = CostCalculator::new(config).compute(&games, &[], &PaidLedger::new(), &[]);
        let charged: Decimal = summary.players().map(|p| p.shuttle_cost).sum();
        let exact: Decimal = summary
            .players()
            .map(|p| Decimal::from(p.shuttles_used) * config.shuttle_price)
            .sum();
        let slack = charged - exact;
        prop_assert!(slack >= Decimal::ZERO);
        prop_assert!(summary.is_empty() || slack < Decimal::from(summary.len() as u64));
    }

    #[test]
    fn prop_totals_never_negative_and_single_discount(
        games in proptest::collection::vec(arb_game(), 1..8),
        config in arb_config(),
        coupons in arb_coupons(),
    ) {
        let summary =
            CostCalculator::new(config).compute(&games, &coupons, &PaidLedger::new(), &[]);
        for player in summary.players() {
            prop_assert!(player.total >= Decimal::ZERO);
            prop_assert!(player.total <= player.raw_total());
            match &player.discount {
                Some(discount) => {
                    let first = coupons.iter().find(|c| c.member_name == player.name).unwrap();
                    prop_assert_eq!(discount.amount, first.discount_amount);
                    prop_assert_eq!(
                        player.total,
                        (player.raw_total() - discount.amount).max(Decimal::ZERO)
                    );
                }
                None => prop_assert_eq!(player.total, player.raw_total()),
            }
        }
    }

    #[test]
    fn prop_live_tallies_match_batch_after_edits(
        games in proptest::collection::vec(arb_game(), 1..6),
        edits in proptest::collection::vec(arb_edit(), 0..16),
    ) {
        let mut live = LiveSession::new();
        live.open().unwrap();
        for game in games {
            live.add_game(game).unwrap();
        }
        for edit in edits {
            apply_edit(&mut live, edit);
        }

        // Batch pricing over the finished games only, with free fees
        let finished: Vec<Game> =
            live.games().iter().filter(|g| g.is_finished()).cloned().collect();
        let free = SessionConfig::new(
            CourtFee::FixedPerPerson(Decimal::ZERO),
            Decimal::ZERO,
            Decimal::ZERO,
        );
        let batch: BTreeMap<String, Tally> = CostCalculator::new(free)
            .compute(&finished, &[], &PaidLedger::new(), &[])
            .players()
            .map(|p| (p.name.clone(), p.tally()))
            .collect();
        prop_assert_eq!(live.tallies(), &batch);
    }
}
