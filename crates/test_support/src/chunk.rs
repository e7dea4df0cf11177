use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoundaryPolicy {
    /// Chunks always end on a UTF-8 character boundary.
    Utf8Aligned,
    /// Raw byte stream; chunks may split a multi-byte sequence.
    ByteStream,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::Utf8Aligned => f.write_str("utf8"),
            BoundaryPolicy::ByteStream => f.write_str("bytes"),
        }
    }
}

/// How a test input is cut into the chunks a stream would deliver.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChunkPlan {
    Fixed {
        size: usize,
        policy: BoundaryPolicy,
    },
    Boundaries {
        indices: Vec<usize>,
        policy: BoundaryPolicy,
    },
}

impl fmt::Display for ChunkPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkPlan::Fixed { size, policy } => write!(f, "fixed size={size} policy={policy}"),
            ChunkPlan::Boundaries { indices, policy } => write!(
                f,
                "boundaries count={} policy={policy} indices={indices:?}",
                indices.len()
            ),
        }
    }
}

impl ChunkPlan {
    pub fn fixed(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn fixed_unaligned(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn boundaries(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn boundaries_unaligned(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn policy(&self) -> BoundaryPolicy {
        match self {
            ChunkPlan::Fixed { policy, .. } | ChunkPlan::Boundaries { policy, .. } => *policy,
        }
    }

    /// Byte chunks of `input` in order. Concatenated, they are `input`.
    pub fn chunks<'a>(&self, input: &'a str) -> Vec<&'a [u8]> {
        let mut out = Vec::new();
        self.for_each_chunk(input, |chunk| out.push(chunk));
        out
    }

    pub fn for_each_chunk<'a>(&self, input: &'a str, mut f: impl FnMut(&'a [u8])) {
        let bytes = input.as_bytes();
        match self {
            ChunkPlan::Fixed { size, policy } => {
                assert!(*size > 0, "chunk size must be > 0");
                let mut offset = 0usize;
                while offset < bytes.len() {
                    let mut end = (offset + size).min(bytes.len());
                    if *policy == BoundaryPolicy::Utf8Aligned {
                        while !input.is_char_boundary(end) {
                            end += 1;
                        }
                    }
                    f(&bytes[offset..end]);
                    offset = end;
                }
            }
            ChunkPlan::Boundaries { indices, policy } => {
                let mut points = filter_boundaries_by_policy(input, indices, *policy);
                points.sort_unstable();
                points.dedup();
                let mut last = 0usize;
                for idx in points {
                    f(&bytes[last..idx]);
                    last = idx;
                }
                if last < bytes.len() {
                    f(&bytes[last..]);
                }
            }
        }
    }

    /// UTF-8 chunks; only valid for aligned plans.
    pub fn text_chunks<'a>(&self, input: &'a str) -> Vec<&'a str> {
        assert_eq!(
            self.policy(),
            BoundaryPolicy::Utf8Aligned,
            "text chunks need an aligned plan"
        );
        self.chunks(input)
            .into_iter()
            .map(|c| std::str::from_utf8(c).expect("aligned chunk"))
            .collect()
    }
}

/// Interior split points of `indices` that are allowed under `policy`.
pub fn filter_boundaries_by_policy(
    input: &str,
    indices: &[usize],
    policy: BoundaryPolicy,
) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|&idx| idx > 0 && idx < input.len())
        .filter(|&idx| policy == BoundaryPolicy::ByteStream || input.is_char_boundary(idx))
        .collect()
}
