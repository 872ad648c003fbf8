//! §4.3 Range merger. A K-way merge over sorted, non-overlapping interval
//! streams, expressed as a lazy iterator so memory stays bounded regardless
//! of snapshot size (spec §9 "lazy generators"): each input stream is only
//! ever one range ahead of the merge's output cursor.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::WhipError;

pub type RangeStream<T> = Box<dyn Iterator<Item = Result<(u128, u128, T), WhipError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Begin,
    End,
}

struct Event<T> {
    pos: u128,
    kind: EventKind,
    stream_id: usize,
    payload: Option<T>,
}

impl<T> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos && self.kind == other.kind
    }
}
impl<T> Eq for Event<T> {}

impl<T> PartialOrd for Event<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Event<T> {
    /// Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap on
    /// `(pos, kind)`, with `Begin` sorting before `End` at equal position so
    /// a zero-length gap is never produced (spec §4.3).
    fn cmp(&self, other: &Self) -> Ordering {
        other.pos.cmp(&self.pos).then_with(|| other.kind.cmp(&self.kind))
    }
}

/// Drives the K-way merge described in spec §4.3. Single-input streams take
/// the documented shortcut and pass through unmodified.
pub struct Merger<T> {
    streams: Vec<RangeStream<T>>,
    prev_end: Vec<Option<u128>>,
    heap: BinaryHeap<Event<T>>,
    active: HashMap<usize, T>,
    previous_position: Option<u128>,
    exhausted: bool,
    single_input_passthrough: bool,
    init_error: Option<WhipError>,
}

impl<T> Merger<T> {
    pub fn new(mut streams: Vec<RangeStream<T>>) -> Self {
        if streams.len() == 1 {
            return Merger {
                streams,
                prev_end: vec![None],
                heap: BinaryHeap::new(),
                active: HashMap::new(),
                previous_position: None,
                exhausted: false,
                single_input_passthrough: true,
                init_error: None,
            };
        }

        let mut heap = BinaryHeap::new();
        let mut prev_end = vec![None; streams.len()];
        let mut init_error = None;
        for (id, stream) in streams.iter_mut().enumerate() {
            match stream.next() {
                Some(Ok((begin, end, payload))) => {
                    match push_range(&mut heap, id, begin, end, payload, None) {
                        Ok(()) => prev_end[id] = Some(end),
                        Err(e) => {
                            init_error.get_or_insert(e);
                        }
                    }
                }
                Some(Err(e)) => {
                    init_error.get_or_insert(e);
                }
                None => {}
            }
        }
        Merger {
            streams,
            prev_end,
            heap,
            active: HashMap::new(),
            previous_position: None,
            exhausted: false,
            single_input_passthrough: false,
            init_error,
        }
    }

    fn pull_next(&mut self, stream_id: usize) -> Result<(), WhipError> {
        match self.streams[stream_id].next() {
            Some(Ok((begin, end, payload))) => {
                push_range(&mut self.heap, stream_id, begin, end, payload, self.prev_end[stream_id])?;
                self.prev_end[stream_id] = Some(end);
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        }
    }
}

fn push_range<T>(
    heap: &mut BinaryHeap<Event<T>>,
    stream_id: usize,
    begin: u128,
    end: u128,
    payload: T,
    prev_end: Option<u128>,
) -> Result<(), WhipError> {
    if begin > end {
        return Err(WhipError::MalformedInputStream(format!(
            "stream {stream_id}: range begin {begin} is after end {end}"
        )));
    }
    if let Some(prev) = prev_end {
        if begin <= prev {
            return Err(WhipError::MalformedInputStream(format!(
                "stream {stream_id}: range begin {begin} does not follow previous end {prev}"
            )));
        }
    }
    heap.push(Event { pos: begin, kind: EventKind::Begin, stream_id, payload: Some(payload) });
    // A range ending at the top of the address space (`end == u128::MAX`,
    // e.g. the last IPv6 address; spec §4.1 states no upper exclusion) has
    // no successor to bound it against — omit the End event rather than
    // overflow, and let it stay active until the merge itself drains.
    if let Some(close_at) = end.checked_add(1) {
        heap.push(Event { pos: close_at, kind: EventKind::End, stream_id, payload: None });
    }
    Ok(())
}

impl<T: Clone> Iterator for Merger<T> {
    type Item = Result<(u128, u128, Vec<T>), WhipError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.single_input_passthrough {
            return self.streams[0].next().map(|r| r.map(|(b, e, p)| (b, e, vec![p])));
        }
        if self.exhausted {
            return None;
        }
        if let Some(e) = self.init_error.take() {
            self.exhausted = true;
            return Some(Err(e));
        }

        loop {
            let Some(position) = self.heap.peek().map(|e| e.pos) else {
                self.exhausted = true;
                if !self.active.is_empty() {
                    // Every Begin event pairs with an End event except a
                    // range reaching `u128::MAX` (see `push_range`), so the
                    // only way the heap can empty with ranges still active
                    // is one or more such ranges left open to the very top
                    // of the address space. Close them out here instead of
                    // treating it as malformed input.
                    let prev = self
                        .previous_position
                        .expect("active is only ever populated after previous_position is set");
                    return Some(Ok((prev, u128::MAX, self.active.values().cloned().collect())));
                }
                return None;
            };

            let pending_output = self.previous_position.and_then(|prev| {
                if !self.active.is_empty() && prev < position {
                    Some((prev, position - 1, self.active.values().cloned().collect::<Vec<_>>()))
                } else {
                    None
                }
            });

            while let Some(top) = self.heap.peek() {
                if top.pos != position {
                    break;
                }
                let event = self.heap.pop().unwrap();
                match event.kind {
                    EventKind::Begin => {
                        if self.active.insert(event.stream_id, event.payload.unwrap()).is_some() {
                            self.exhausted = true;
                            return Some(Err(WhipError::MalformedInputStream(format!(
                                "stream {} began a range while already active",
                                event.stream_id
                            ))));
                        }
                    }
                    EventKind::End => {
                        if self.active.remove(&event.stream_id).is_none() {
                            self.exhausted = true;
                            return Some(Err(WhipError::MalformedInputStream(format!(
                                "stream {} ended a range that was never active",
                                event.stream_id
                            ))));
                        }
                        if let Err(e) = self.pull_next(event.stream_id) {
                            self.exhausted = true;
                            return Some(Err(e));
                        }
                    }
                }
            }

            self.previous_position = Some(position);
            if let Some(range) = pending_output {
                return Some(Ok(range));
            }
            // No output at this position (active was empty); keep draining.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(ranges: Vec<(u128, u128, &'static str)>) -> RangeStream<&'static str> {
        Box::new(ranges.into_iter().map(Ok))
    }

    fn collect(merger: Merger<&'static str>) -> Vec<(u128, u128, Vec<&'static str>)> {
        merger.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn single_input_passes_through_unchanged() {
        let m = Merger::new(vec![stream(vec![(0, 1, "a"), (4, 4, "b")])]);
        assert_eq!(collect(m), vec![(0, 1, vec!["a"]), (4, 4, vec!["b"])]);
    }

    #[test]
    fn adjacent_ranges_yield_distinct_output_ranges() {
        let a = stream(vec![(0, 4, "a")]);
        let b = stream(vec![(5, 9, "b")]);
        let m = Merger::new(vec![a, b]);
        assert_eq!(collect(m), vec![(0, 4, vec!["a"]), (5, 9, vec!["b"])]);
    }

    #[test]
    fn fully_contained_ranges_shrink_then_grow_the_active_set() {
        let outer = stream(vec![(0, 9, "outer")]);
        let inner = stream(vec![(3, 5, "inner")]);
        let m = Merger::new(vec![outer, inner]);
        assert_eq!(
            collect(m),
            vec![(0, 2, vec!["outer"]), (3, 5, vec!["outer", "inner"]), (6, 9, vec!["outer"])]
        );
    }

    #[test]
    fn range_ending_at_the_top_of_the_address_space_does_not_overflow() {
        let a = stream(vec![(0, 4, "a"), (5, u128::MAX, "b")]);
        let m = Merger::new(vec![a]);
        assert_eq!(collect(m), vec![(0, 4, vec!["a"]), (5, u128::MAX, vec!["b"])]);

        let a = stream(vec![(0, u128::MAX, "a")]);
        let b = stream(vec![(10, 20, "b")]);
        let m = Merger::new(vec![a, b]);
        assert_eq!(
            collect(m),
            vec![(0, 9, vec!["a"]), (10, 20, vec!["a", "b"]), (21, u128::MAX, vec!["a"])]
        );
    }

    #[test]
    fn out_of_order_ranges_within_a_stream_are_rejected() {
        let bad = stream(vec![(5, 9, "a"), (0, 1, "b")]);
        let other = stream(vec![(0, 20, "z")]);
        let m = Merger::new(vec![bad, other]);
        assert!(m.map(|r| r).any(|r| r.is_err()));
    }

    /// The spec §8 merger scenario, verbatim.
    #[test]
    fn spec_scenario_six() {
        let inputs: Vec<RangeStream<&'static str>> = vec![
            stream(vec![(0, 1, "a1"), (4, 4, "a2"), (6, 6, "a3"), (17, 20, "a4")]),
            stream(vec![(1, 4, "b1")]),
            stream(vec![(0, 0, "c1"), (1, 2, "c2"), (12, 14, "c3")]),
            stream(vec![(10, 20, "d1")]),
            stream(vec![]),
        ];
        let m = Merger::new(inputs);
        let mut got = collect(m);
        for (_, _, payloads) in got.iter_mut() {
            payloads.sort();
        }
        let mut expected = vec![
            (0, 0, vec!["a1", "c1"]),
            (1, 1, vec!["a1", "b1", "c2"]),
            (2, 2, vec!["b1", "c2"]),
            (3, 3, vec!["b1"]),
            (4, 4, vec!["a2", "b1"]),
            (6, 6, vec!["a3"]),
            (10, 11, vec!["d1"]),
            (12, 14, vec!["c3", "d1"]),
            (15, 16, vec!["d1"]),
            (17, 20, vec!["a4", "d1"]),
        ];
        for (_, _, payloads) in expected.iter_mut() {
            payloads.sort();
        }
        assert_eq!(got, expected);
    }
}
