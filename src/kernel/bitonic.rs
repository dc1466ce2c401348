#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One `(stage, pass)` compare-exchange pass of the bitonic network.
///
/// Element `idx` pairs with `idx ^ distance` where `distance = 1 << (stage - pass)`. The pairs
/// fall into disjoint blocks of `2 * distance` elements, and within one block the direction
/// `((idx >> (stage + 1)) & 1) == 0` is constant, so blocks are exchanged independently and only
/// the lower element of each pair writes.
pub(crate) fn bitonic_pass<K: PartialOrd + Copy + Send>(keys: &mut [K], stage: u32, pass: u32) {
    let block = 2usize << (stage - pass);

    #[cfg(feature = "rayon")]
    {
        keys.par_chunks_mut(block)
            .enumerate()
            .for_each(|(i, keys)| exchange_keys(keys, ascending(i * block, stage)));
    }

    #[cfg(not(feature = "rayon"))]
    {
        keys.chunks_mut(block)
            .enumerate()
            .for_each(|(i, keys)| exchange_keys(keys, ascending(i * block, stage)));
    }
}

/// Like [`bitonic_pass`], moving `value_words` words of `values` along with every key.
pub(crate) fn key_value_bitonic_pass<K: PartialOrd + Copy + Send>(
    keys: &mut [K],
    values: &mut [u32],
    value_words: usize,
    stage: u32,
    pass: u32,
) {
    debug_assert_eq!(keys.len() * value_words, values.len());
    let block = 2usize << (stage - pass);

    #[cfg(feature = "rayon")]
    {
        keys.par_chunks_mut(block)
            .zip(values.par_chunks_mut(block * value_words))
            .enumerate()
            .for_each(|(i, (keys, values))| {
                exchange_pairs(keys, values, value_words, ascending(i * block, stage))
            });
    }

    #[cfg(not(feature = "rayon"))]
    {
        keys.chunks_mut(block)
            .zip(values.chunks_mut(block * value_words))
            .enumerate()
            .for_each(|(i, (keys, values))| {
                exchange_pairs(keys, values, value_words, ascending(i * block, stage))
            });
    }
}

#[inline]
fn ascending(idx: usize, stage: u32) -> bool {
    ((idx >> (stage + 1)) & 1) == 0
}

#[inline]
fn out_of_order<K: PartialOrd>(lower: &K, upper: &K, ascending: bool) -> bool {
    if ascending {
        lower > upper
    } else {
        lower < upper
    }
}

fn exchange_keys<K: PartialOrd + Copy>(block: &mut [K], ascending: bool) {
    let (lower, upper) = block.split_at_mut(block.len() / 2);
    for (a, b) in lower.iter_mut().zip(upper.iter_mut()) {
        if out_of_order(a, b, ascending) {
            std::mem::swap(a, b);
        }
    }
}

fn exchange_pairs<K: PartialOrd + Copy>(
    keys: &mut [K],
    values: &mut [u32],
    value_words: usize,
    ascending: bool,
) {
    let half = keys.len() / 2;
    let (lower, upper) = keys.split_at_mut(half);
    let (lower_values, upper_values) = values.split_at_mut(half * value_words);
    for (k, (a, b)) in lower.iter_mut().zip(upper.iter_mut()).enumerate() {
        if out_of_order(a, b, ascending) {
            std::mem::swap(a, b);
            let words = k * value_words..(k + 1) * value_words;
            lower_values[words.clone()].swap_with_slice(&mut upper_values[words]);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn network(keys: &mut [i32]) {
        let log_n = keys.len().trailing_zeros();
        for stage in 0..log_n {
            for pass in 0..=stage {
                bitonic_pass(keys, stage, pass);
            }
        }
    }

    #[test]
    fn first_stage_alternates_direction() {
        let mut keys = [4, 1, 2, 3, 8, 5, 6, 7];
        bitonic_pass(&mut keys, 0, 0);
        assert_eq!(keys, [1, 4, 3, 2, 5, 8, 7, 6]);
    }

    #[test]
    fn full_network_sorts() {
        let mut keys = [7, 3, 5, 1, 6, 0, 4, 2, -9, 12, 12, 3, 0, 0, 100, -1];
        network(&mut keys);
        assert_eq!(keys, [-9, -1, 0, 0, 0, 1, 2, 3, 3, 4, 5, 6, 7, 12, 12, 100]);
    }

    #[test]
    fn values_follow_keys() {
        let mut keys = [3u32, 0, 2, 1];
        // two words per value
        let mut values = [30, 31, 0, 1, 20, 21, 10, 11];
        let log_n = keys.len().trailing_zeros();
        for stage in 0..log_n {
            for pass in 0..=stage {
                key_value_bitonic_pass(&mut keys, &mut values, 2, stage, pass);
            }
        }
        assert_eq!(keys, [0, 1, 2, 3]);
        assert_eq!(values, [0, 1, 10, 11, 20, 21, 30, 31]);
    }
}
