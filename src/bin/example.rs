use crowdrank::{ComparisonOutcome, RankingSession, Strategy};

fn main() {
    println!("crowdrank: pairwise-preference ranking engine");
    println!("=============================================\n");

    basic_example();

    active_loop_example();
}

fn beat(winner: &'static str, loser: &'static str) -> ComparisonOutcome<&'static str> {
    ComparisonOutcome {
        candidate_a: winner,
        candidate_b: loser,
        winner: Some(winner),
    }
}

fn basic_example() {
    println!("Basic Example:");
    println!("-------------");

    let candidates = ["alpha", "bravo", "charlie", "delta"];
    let mut session = RankingSession::new(&candidates, 1).unwrap();

    let outcomes = vec![
        beat("alpha", "bravo"),
        beat("bravo", "charlie"),
        beat("alpha", "charlie"),
        beat("charlie", "delta"),
        beat("bravo", "delta"),
    ];
    session.record_all(outcomes).unwrap();

    println!("Skill beliefs after 5 votes:");
    for candidate in &candidates {
        let belief = session.belief(candidate).unwrap();
        println!(
            "  {}: mu = {:+.4}, sigma_sq = {:.4}",
            candidate, belief.mu, belief.sigma_sq
        );
    }

    let competence = session.competence();
    println!(
        "\nAnnotator competence: Beta({:.2}, {:.2}), mean {:.3}",
        competence.alpha,
        competence.beta,
        competence.mean()
    );

    let ranking = session.ranking().unwrap();
    println!("\nSchulze ranking:");
    for result in &ranking.results {
        println!(
            "  #{} {} (score {}, direct wins {})",
            result.rank, result.candidate, result.score, result.direct_wins
        );
    }
    if ranking.incomplete {
        println!("  ({} more comparisons needed)", ranking.comparisons_needed);
    }
    println!();
}

fn active_loop_example() {
    println!("Active Selection Loop:");
    println!("---------------------");

    // A hidden total order decides each vote; the engine recovers it by
    // asking for the most informative pair each round.
    let candidates = ["north", "east", "south", "west"];
    let strength = |c: &str| candidates.iter().rev().position(|&x| x == c).unwrap();

    let mut session = RankingSession::new(&candidates, 1).unwrap();

    while let Some(pair) = session.next_pair(Strategy::BeliefGap).unwrap() {
        let (a, b) = (*pair.first(), *pair.second());
        let winner = if strength(a) > strength(b) { a } else { b };

        let gain = session.expected_information_gain(&a, &b).unwrap();
        println!("  asking {} vs {} (expected gain {:.4}) -> {}", a, b, gain, winner);

        session
            .record(ComparisonOutcome {
                candidate_a: a,
                candidate_b: b,
                winner: Some(winner),
            })
            .unwrap();
    }

    let ranking = session.ranking().unwrap();
    println!("\nRecovered ranking:");
    for result in &ranking.results {
        println!("  #{} {}", result.rank, result.candidate);
    }

    let (completed, remaining, total) = session.progress();
    println!("\nProgress: {}/{} comparisons, {} remaining", completed, total, remaining);
}
