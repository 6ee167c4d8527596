//! End-to-end tests: derive a batch, deploy its motions, vote on them

use std::fs;
use std::sync::Arc;

use qv::config::BatchConfig;
use qv::core::common::{Address, Amount, CardData, MotionId, Side};
use qv::deployer::AddressDeriver;
use qv::ledger::{BallotCards, BallotRequest, FungibleToken, Ledger, MutableDataCards, SimpleToken};
use qv::proposals::{run_batch, ProposalDocument};

fn setup_test_env(how_many: usize) -> (tempfile::TempDir, BatchConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = BatchConfig {
        how_many,
        out_dir: dir.path().to_path_buf(),
        ..BatchConfig::default()
    };
    (dir, config)
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_published_addresses_match_deployment() {
    let (_dir, config) = setup_test_env(3);
    run_batch(&AddressDeriver::new(), &config, None).unwrap();

    let booths = read_lines(&config.output_path(&config.files.booth));
    let yes_boxes = read_lines(&config.output_path(&config.files.yes));
    assert_eq!(booths.len(), 3);

    let ledger = Ledger::new();
    let tokens = config.tokens;
    let issuer = Address::new([0x01; 20]);
    let voter = Address::new([0x0a; 20]);

    let voice = Arc::new(SimpleToken::new(tokens.voice_credits, "VOICE", issuer, Amount::tokens(1_000)));
    let votes = Arc::new(SimpleToken::new(tokens.votes, "VOTE", issuer, Amount::tokens(1_000)));
    let cards = Arc::new(MutableDataCards::new(tokens.ballot_cards));
    ledger.register_token(voice.clone()).unwrap();
    ledger.register_token(votes.clone()).unwrap();
    ledger.register_cards(cards.clone()).unwrap();

    let motion = MotionId::new(2).unwrap();
    let yes = ledger.deploy_ballot_box(Side::Yes, motion).unwrap();
    ledger.deploy_ballot_box(Side::No, motion).unwrap();
    let booth = ledger
        .deploy_voting_booth(motion, tokens.voice_credits, tokens.votes, tokens.ballot_cards)
        .unwrap();

    assert_eq!(booth.address().to_string(), booths[2]);
    assert_eq!(yes.address().to_string(), yes_boxes[2]);

    voice.transfer(&issuer, &voter, &Amount::tokens(400)).unwrap();
    votes.transfer(&issuer, &voter, &Amount::tokens(400)).unwrap();
    voice.approve(&voter, &booth.address(), &Amount::tokens(400)).unwrap();
    votes.approve(&voter, &booth.address(), &Amount::tokens(400)).unwrap();
    cards.mint(&voter, 1).unwrap();
    cards.approve(&voter, &booth.address(), 1).unwrap();

    let request = BallotRequest {
        card_id: 1,
        expected_prior_data: CardData::UNUSED,
        vote_weight: Amount::tokens(3),
        side: Side::Yes,
    };
    ledger.cast_ballot(&voter, &booth.address(), &request).unwrap();

    let tally = ledger.tally(&yes.address()).unwrap();
    assert_eq!(tally.voice_credits, Amount::tokens(9));
    assert_eq!(tally.votes, Amount::tokens(3));
    assert_ne!(cards.read_data(1).unwrap(), CardData::UNUSED);
}

#[test]
fn test_rerun_replaces_outputs_and_keeps_metadata() {
    let (_dir, config) = setup_test_env(4);
    let old_data = config.output_path(&config.files.old_data);
    fs::write(
        &old_data,
        r#"{"proposals":[{"title":"Parks","topics":["city"],"proposalId":"41","description":"More parks"},{"title":"Ignored","proposalId":""}]}"#,
    )
    .unwrap();

    let first = run_batch(&AddressDeriver::new(), &config, None).unwrap();
    let second = run_batch(&AddressDeriver::new(), &config, Some(old_data.as_path())).unwrap();
    assert_eq!(first, second);

    assert_eq!(read_lines(&config.output_path(&config.files.booth)).len(), 4);
    assert_eq!(read_lines(&config.output_path(&config.files.no)).len(), 4);

    let json = fs::read_to_string(config.output_path(&config.files.json)).unwrap();
    let document: ProposalDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(document.proposals.len(), 4);
    assert_eq!(document.proposals[0].title, "Parks");
    assert_eq!(document.proposals[0].proposal_id, "41");
    assert_eq!(document.proposals[1].title, "");
    assert_eq!(document.vote_start_time, "");
}

#[test]
fn test_malformed_prior_document_aborts() {
    let (_dir, config) = setup_test_env(2);
    fs::write(config.output_path(&config.files.old_data), "[1, 2").unwrap();

    assert!(run_batch(&AddressDeriver::new(), &config, None).is_err());
    assert!(!config.output_path(&config.files.json).exists());
}
