//! Demo showing the bounded-memory Gram row cache
//!
//! Walks through symmetric reuse while filling rows, LRU eviction under a
//! tight byte budget, the separately cached diagonal, index swaps, and
//! read-only sharing between buddy caches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strkernel::cache::KernelRowCache;
use strkernel::core::{Alphabet, KernelFunction, SequenceSet};
use strkernel::data::DenseSequenceSet;
use strkernel::kernel::WeightedDegreeKernel;

/// Kernel wrapper counting how often the wrapped kernel is evaluated
struct CountingKernel<K: KernelFunction> {
    inner: K,
    calls: AtomicU64,
}

impl<K: KernelFunction> CountingKernel<K> {
    fn new(inner: K) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<K: KernelFunction> KernelFunction for CountingKernel<K> {
    fn compute(&self, i: usize, j: usize) -> f64 {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.compute(i, j)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Kernel Row Cache Demo ===");

    let alphabet = Alphabet::dna();
    let strings = [
        "GATTACAGATTA",
        "GATTACAGATTC",
        "GATTCCAGATTA",
        "CATTACAGATTA",
        "TTGGCCAATTGG",
        "ACGTACGTACGT",
        "TGCATGCATGCA",
        "AAAACCCCGGGG",
    ];
    let labels = [1.0; 8];
    let set = Arc::new(DenseSequenceSet::from_strings(
        &strings, &labels, &alphabet,
    )?);
    let n = set.len();

    let kernel = Arc::new(CountingKernel::new(WeightedDegreeKernel::new(
        Arc::clone(&set),
        4,
        0,
    )?));

    // Symmetric reuse while filling every row
    println!("\n--- Full Gram pass ---");
    let mut cache =
        KernelRowCache::new(Arc::clone(&kernel) as Arc<dyn KernelFunction>);
    for i in 0..n {
        cache.query_row(i, n);
    }
    let stats = cache.stats();
    println!(
        "{} kernel evaluations covered all {} entries of a {n}x{n} matrix",
        kernel.calls(),
        n * n
    );
    println!(
        "  {} transposed or diagonal entries were served from cache",
        stats.hits
    );
    println!("  row storage: {} bytes", cache.get_current_size());

    // LRU eviction under a tight budget
    println!("\n--- Tight budget ({} bytes, one row is {} bytes) ---", 200, n * 8);
    let mut small = KernelRowCache::with_maximum_size(
        Arc::clone(&kernel) as Arc<dyn KernelFunction>,
        200,
    )?;
    for i in 0..n {
        small.query_row(i, n);
    }
    print!("surviving prefix lengths:");
    for i in 0..n {
        print!(" {}", small.status_row(i));
    }
    println!();
    let stats = small.stats();
    println!(
        "{} evictions kept storage at {} of {} bytes",
        stats.evictions,
        small.get_current_size(),
        small.get_maximum_size()
    );
    let before = kernel.calls();
    let diag = small.query(0, 0);
    println!(
        "diagonal of the evicted row 0 still answers from cache: {:.4} ({} new evaluations)",
        diag,
        kernel.calls() - before
    );

    // Index swaps keep cached values attributed to the right examples
    println!("\n--- Index swaps ---");
    println!(
        "before: example at row 0 is {}, at row 5 is {}",
        cache.example_at_row(0),
        cache.example_at_row(5)
    );
    cache.swap_ii(0, 5);
    println!(
        "after swap_ii(0, 5): example at row 0 is {}, at row 5 is {}",
        cache.example_at_row(0),
        cache.example_at_row(5)
    );
    let mut worst = 0.0f64;
    for i in 0..n {
        for j in 0..n {
            worst = worst.max((cache.query(i, j) - kernel.compute(i, j)).abs());
        }
    }
    println!("largest deviation from direct evaluation: {worst:.2e}");

    // Buddy caches read each other's rows
    println!("\n--- Buddy sharing ---");
    let shared = Arc::clone(&kernel) as Arc<dyn KernelFunction>;
    let mut first = KernelRowCache::new(Arc::clone(&shared));
    let second = KernelRowCache::new(shared);
    first.set_buddy(&second);
    first.query_row(2, n);
    let before = kernel.calls();
    let from_buddy = second.query(2, 4);
    println!(
        "second cache read k(2, 4) = {from_buddy:.4} from its buddy ({} new evaluations)",
        kernel.calls() - before
    );
    let fresh = second.query(6, 7);
    println!(
        "an entry neither cache holds goes to the kernel: k(6, 7) = {fresh:.4} ({} new evaluations)",
        kernel.calls() - before
    );

    Ok(())
}
