//! Hadamard matrices used for two-level screening designs.
//!
//! ## Sylvester Construction
//!
//! For n = 2^m: H₁ = \[1\], H_{2n} = \[\[H_n, H_n\], \[H_n, −H_n\]\].
//!
//! ## Paley Construction
//!
//! For n = p + 1 with p prime and p ≡ 3 (mod 4), built from the quadratic
//! residue character of GF(p).
//!
//! Both are returned normalized: first row and first column all +1.

use ndarray::Array2;

/// Normalized Sylvester-Hadamard matrix of order `n`, if `n` is a power of 2.
#[must_use]
pub fn sylvester(n: usize) -> Option<Array2<i8>> {
    if n == 0 || !n.is_power_of_two() {
        return None;
    }
    let mut h = Array2::from_elem((n, n), 1i8);

    // h[0..size, 0..size] holds H_size at the top of each iteration.
    let mut size = 1;
    while size < n {
        for i in 0..size {
            for j in 0..size {
                let v = h[[i, j]];
                h[[i, j + size]] = v;
                h[[i + size, j]] = v;
                h[[i + size, j + size]] = -v;
            }
        }
        size *= 2;
    }
    Some(h)
}

/// Normalized Paley-Hadamard matrix of order `n`, if `n − 1` is a prime ≡ 3 (mod 4).
#[must_use]
pub fn paley(n: usize) -> Option<Array2<i8>> {
    let p = u32::try_from(n.checked_sub(1)?).ok()?;
    if !is_prime(p) || p % 4 != 3 {
        return None;
    }

    let legendre = |a: u32| -> i8 {
        let a = a % p;
        if a == 0 {
            0
        } else if mod_pow(u64::from(a), u64::from((p - 1) / 2), u64::from(p)) == 1 {
            1
        } else {
            -1
        }
    };

    let mut h = Array2::from_elem((n, n), 1i8);
    for i in 1..n {
        h[[i, 0]] = -1;
    }
    for i in 1..n {
        for j in 1..n {
            let (fi, fj) = ((i - 1) as u32, (j - 1) as u32);
            h[[i, j]] = if fi == fj { 1 } else { legendre((fj + p - fi) % p) };
        }
    }

    // Negate rows, then columns, so the first row and column are all +1.
    for i in 0..n {
        if h[[i, 0]] == -1 {
            h.row_mut(i).mapv_inplace(|v| -v);
        }
    }
    for j in 0..n {
        if h[[0, j]] == -1 {
            h.column_mut(j).mapv_inplace(|v| -v);
        }
    }
    Some(h)
}

/// Deterministic Miller-Rabin test for 32-bit integers.
///
/// Witnesses 2, 7 and 61 decide every n below 4,759,123,141.
fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return n < 4;
    }

    let n64 = u64::from(n);
    let n_minus_1 = n64 - 1;
    let r = n_minus_1.trailing_zeros();
    let d = n_minus_1 >> r;

    'witness: for a in [2u64, 7, 61] {
        if a >= n64 {
            continue;
        }
        let mut x = mod_pow(a, d, n64);
        if x == 1 || x == n_minus_1 {
            continue;
        }
        for _ in 1..r {
            x = x * x % n64;
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// `base^exp mod modulus` by binary exponentiation.
fn mod_pow(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut result = 1u64;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % modulus;
        }
        exp >>= 1;
        base = base * base % modulus;
    }
    result
}
