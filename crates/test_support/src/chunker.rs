//! Deterministic and seeded chunk plans for streaming tests.

use crate::chunk::{BoundaryPolicy, ChunkPlan, filter_boundaries_by_policy};

#[derive(Clone, Debug)]
pub struct ChunkPlanCase {
    pub label: String,
    pub plan: ChunkPlan,
}

/// Fixed sizes, splits around markup punctuation and comment delimiters, and
/// `fuzz_runs` seeded random boundary sets.
pub fn build_chunk_plans(
    input: &str,
    fuzz_runs: usize,
    fuzz_seed: u64,
    policy: BoundaryPolicy,
) -> Vec<ChunkPlanCase> {
    let mut plans = Vec::new();

    for size in [1usize, 2, 3, 4, 8, 16, 32, 64] {
        let plan = match policy {
            BoundaryPolicy::Utf8Aligned => ChunkPlan::fixed(size),
            BoundaryPolicy::ByteStream => ChunkPlan::fixed_unaligned(size),
        };
        plans.push(ChunkPlanCase {
            label: format!("fixed size={size}"),
            plan,
        });
    }

    let markup = markup_boundaries(input, policy);
    if !markup.is_empty() {
        plans.push(ChunkPlanCase {
            label: format!("markup-boundaries count={}", markup.len()),
            plan: boundaries_plan(markup.clone(), policy),
        });
    }

    let every_index: Vec<usize> = (1..input.len()).collect();
    let mut candidates = filter_boundaries_by_policy(input, &every_index, policy);
    if candidates.is_empty() {
        return plans;
    }
    candidates.extend(markup);
    candidates.sort_unstable();
    candidates.dedup();

    for i in 0..fuzz_runs {
        let seed = fuzz_seed.wrapping_add(i as u64);
        let mut rng = Lcg::new(seed);
        let mut picks = candidates.clone();
        rng.shuffle(&mut picks);
        picks.truncate(1 + rng.gen_range(candidates.len().clamp(1, 32)));
        picks.sort_unstable();
        plans.push(ChunkPlanCase {
            label: format!("fuzz boundaries seed=0x{seed:016x}"),
            plan: boundaries_plan(picks, policy),
        });
    }

    plans
}

pub fn build_chunk_plans_utf8(input: &str, fuzz_runs: usize, fuzz_seed: u64) -> Vec<ChunkPlanCase> {
    build_chunk_plans(input, fuzz_runs, fuzz_seed, BoundaryPolicy::Utf8Aligned)
}

fn boundaries_plan(indices: Vec<usize>, policy: BoundaryPolicy) -> ChunkPlan {
    match policy {
        BoundaryPolicy::Utf8Aligned => ChunkPlan::boundaries(indices),
        BoundaryPolicy::ByteStream => ChunkPlan::boundaries_unaligned(indices),
    }
}

/// Split points just before and after `<`, `>`, quotes, and inside `<!--` / `-->`.
fn markup_boundaries(input: &str, policy: BoundaryPolicy) -> Vec<usize> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'<' | b'>' | b'"' | b'\'') {
            out.push(i);
            out.push(i + 1);
        }
        if bytes[i..].starts_with(b"<!--") {
            out.extend([i + 2, i + 3]);
        }
        if bytes[i..].starts_with(b"-->") {
            out.extend([i + 1, i + 2]);
        }
    }
    out.sort_unstable();
    out.dedup();
    filter_boundaries_by_policy(input, &out, policy)
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() >> 32) as usize % upper
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.gen_range(i + 1);
            items.swap(i, j);
        }
    }
}
