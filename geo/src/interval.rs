/// An open `(start, end)` interval of ray parameter `t`, the unit of
/// currency CSG combination operates on: a shape's intersections with a
/// ray are represented as a sorted list of interval endpoints, and set
/// operations on shapes become set operations on these intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        debug_assert!(start <= end, "Interval::new requires start <= end");
        Interval { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start < t && t < self.end
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Turn a sorted list of ray hit parameters (the odd/even boundary
/// crossings produced by `get_all_ts`) into a list of open intervals. The
/// list must have even length: every entry into a closed solid must be
/// paired with an exit.
pub fn ts_to_intervals(ts: &[f64]) -> Vec<Interval> {
    assert!(ts.len() % 2 == 0, "ts_to_intervals requires an even-length list, got {}", ts.len());
    ts.chunks_exact(2).map(|pair| Interval::new(pair[0], pair[1])).collect()
}

/// Flatten a list of intervals back into a sorted list of boundary `t`
/// values, the inverse of `ts_to_intervals`.
pub fn intervals_to_ts(intervals: &[Interval]) -> Vec<f64> {
    intervals.iter().flat_map(|i| [i.start, i.end]).collect()
}

/// Union of two sorted interval lists: merge overlapping/adjacent
/// intervals from both operands into the minimal covering set.
pub fn union(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    let mut all: Vec<Interval> = a.iter().chain(b.iter()).copied().collect();
    all.sort_by(|x, y| x.start.partial_cmp(&y.start).unwrap());

    let mut out: Vec<Interval> = Vec::new();
    for iv in all {
        match out.last_mut() {
            Some(last) if iv.start <= last.end => {
                last.end = last.end.max(iv.end);
            }
            _ => out.push(iv),
        }
    }
    out
}

/// Intersection of two sorted interval lists.
pub fn intersect(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);

        if start < end {
            out.push(Interval::new(start, end));
        }

        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }

    out
}

/// Set-difference `a - b`: the parts of `a` not covered by any interval of
/// `b`.
pub fn diff(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    let mut out = Vec::new();

    for iv in a {
        let mut remaining = vec![*iv];

        for sub in b {
            let mut next = Vec::new();
            for r in remaining {
                if !r.overlaps(sub) {
                    next.push(r);
                    continue;
                }
                if r.start < sub.start {
                    next.push(Interval::new(r.start, sub.start));
                }
                if sub.end < r.end {
                    next.push(Interval::new(sub.end, r.end));
                }
            }
            remaining = next;
        }

        out.extend(remaining);
    }

    out
}

/// Fuse (symmetric combination used when more than two CSG operands are
/// folded together without an explicit pairing): union followed by
/// re-merging, equivalent to treating all operands as one unordered set.
pub fn fuse(all: &[&[Interval]]) -> Vec<Interval> {
    all.iter().fold(Vec::new(), |acc, ivs| union(&acc, ivs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_merges_overlapping() {
        let a = [Interval::new(0.0, 2.0)];
        let b = [Interval::new(1.0, 3.0)];

        assert_eq!(union(&a, &b), vec![Interval::new(0.0, 3.0)]);
    }

    #[test]
    fn test_union_keeps_disjoint() {
        let a = [Interval::new(0.0, 1.0)];
        let b = [Interval::new(2.0, 3.0)];

        assert_eq!(union(&a, &b), vec![Interval::new(0.0, 1.0), Interval::new(2.0, 3.0)]);
    }

    #[test]
    fn test_intersect() {
        let a = [Interval::new(0.0, 2.0)];
        let b = [Interval::new(1.0, 3.0)];

        assert_eq!(intersect(&a, &b), vec![Interval::new(1.0, 2.0)]);
    }

    #[test]
    fn test_diff() {
        let a = [Interval::new(0.0, 3.0)];
        let b = [Interval::new(1.0, 2.0)];

        assert_eq!(diff(&a, &b), vec![Interval::new(0.0, 1.0), Interval::new(2.0, 3.0)]);
    }

    #[test]
    fn test_ts_roundtrip() {
        let ts = vec![1.0, 2.0, 4.0, 5.0];
        let intervals = ts_to_intervals(&ts);

        assert_eq!(intervals_to_ts(&intervals), ts);
    }

    #[test]
    #[should_panic(expected = "even-length")]
    fn test_ts_to_intervals_panics_on_odd_length() {
        ts_to_intervals(&[1.0, 2.0, 3.0]);
    }
}
