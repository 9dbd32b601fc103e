use byteorder::{BigEndian, ByteOrder};
use sha1::{Digest, Sha1};

/// One virtual node's position on the ring.
#[derive(Debug, Clone, Copy)]
struct RingEntry {
    position: u32,
    shard_index: usize,
}

/// Deterministic, stateless key → shard mapping. Built once at startup from
/// an ordered shard list; picking is a pure binary search, no I/O.
#[derive(Debug, Clone)]
pub struct HashRing {
    entries: Vec<RingEntry>,
    shards: Vec<String>,
}

fn position_of(input: &str) -> u32 {
    let digest = Sha1::digest(input.as_bytes());
    BigEndian::read_u32(&digest[0..4])
}

impl HashRing {
    /// Builds the ring from an ordered shard list and a virtual-node count.
    /// `vnodes` should be at least 10 for the balance guarantees in the
    /// module docs to hold; this does not enforce that, it just maps.
    pub fn build(shards: &[String], vnodes: usize) -> Self {
        let mut entries = Vec::with_capacity(shards.len() * vnodes);
        for (shard_index, shard) in shards.iter().enumerate() {
            for i in 0..vnodes {
                let label = format!("{shard}#{i}");
                entries.push(RingEntry {
                    position: position_of(&label),
                    shard_index,
                });
            }
        }
        // Stable sort preserves emission order as the tie-break for equal
        // positions, per the ring's construction rule.
        entries.sort_by_key(|e| e.position);

        Self {
            entries,
            shards: shards.to_vec(),
        }
    }

    /// Maps a key to the shard that owns it: binary search for the first
    /// entry at or past the key's position, wrapping to the first entry if
    /// the key's position exceeds every ring position.
    pub fn pick(&self, key: &str) -> &str {
        let target = position_of(key);
        let idx = self.entries.partition_point(|e| e.position < target);
        let idx = if idx == self.entries.len() { 0 } else { idx };
        &self.shards[self.entries[idx].shard_index]
    }

    pub fn shards(&self) -> &[String] {
        &self.shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashMap;

    fn shards(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://shard-{i}")).collect()
    }

    #[test]
    fn pick_always_returns_a_known_shard() {
        let s = shards(3);
        let ring = HashRing::build(&s, 50);
        for i in 0..200 {
            let key = format!("key-{i}");
            assert!(s.contains(&ring.pick(&key).to_string()));
        }
    }

    #[test]
    fn pick_is_deterministic() {
        let s = shards(3);
        let ring = HashRing::build(&s, 50);
        assert_eq!(ring.pick("user:1"), ring.pick("user:1"));
    }

    #[test]
    fn single_shard_ring_always_picks_it() {
        let s = shards(1);
        let ring = HashRing::build(&s, 20);
        for i in 0..50 {
            assert_eq!(ring.pick(&format!("k{i}")), "http://shard-0");
        }
    }

    #[test]
    fn balance_within_30_percent_of_mean_for_1000_keys_over_3_shards() {
        let s = shards(3);
        let ring = HashRing::build(&s, 100);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let key: String = (0..16).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            *counts.entry(ring.pick(&key)).or_insert(0) += 1;
        }
        let mean = 1000.0 / 3.0;
        for count in counts.values() {
            let skew = (*count as f64 - mean).abs() / mean;
            assert!(skew <= 0.30, "shard count {count} skewed {skew} from mean {mean}");
        }
    }

    #[test]
    fn adding_a_shard_leaves_most_keys_unchanged() {
        let before_shards = shards(3);
        let before = HashRing::build(&before_shards, 100);

        let mut after_shards = before_shards.clone();
        after_shards.push("http://shard-3".to_string());
        let after = HashRing::build(&after_shards, 100);

        let keys: Vec<String> = (0..1000).map(|i| format!("key-{i}")).collect();
        let unchanged = keys
            .iter()
            .filter(|k| before.pick(k) == after.pick(k))
            .count();
        let fraction = unchanged as f64 / keys.len() as f64;
        assert!(fraction >= 0.70, "only {fraction} of keys were unchanged");
    }
}
