//! 任意精度整数（BigUint）による参照実装。
//!
//! 固定幅演算を一切使わずに同じ探索を行う。遅いが単純なので、
//! 探索エンジンの答え合わせと `--check` に使う。

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::accelerator::LoopAccelerator;

/// 最下位から数えて最初の奇数桁の位置。全桁偶数（0 を含む）なら None
pub fn first_odd_digit_big(n: &BigUint) -> Option<u32> {
    let ten = BigUint::from(10u32);
    let mut n = n.clone();
    let mut position = 0;
    while !n.is_zero() {
        let (q, r) = n.div_rem(&ten);
        if r.is_odd() {
            return Some(position);
        }
        n = q;
        position += 1;
    }
    None
}

fn power_of_ten(digits: u32) -> BigUint {
    num_traits::pow(BigUint::from(10u32), digits as usize)
}

/// アクセラレータが指す指数だけを直接べき乗して調べる。
/// 導入部 1..=leadin と、各バッチ j < ceil(limit/L) の j·L + index を対象にする
pub fn reference_solutions(digits: u32, accel: &LoopAccelerator, limit: u64) -> Vec<u64> {
    let modulus = power_of_ten(digits);
    let two = BigUint::from(2u32);
    let mut solutions = Vec::new();

    let mut z = &two % &modulus;
    for n in 1..=accel.leadin {
        if first_odd_digit_big(&z).is_none() {
            solutions.push(n);
        }
        z = (z * &two) % &modulus;
    }

    let batches = limit.div_ceil(accel.length);
    for batch in 0..batches {
        for &index in &accel.index {
            let n = batch * accel.length + index;
            let z = two.modpow(&BigUint::from(n), &modulus);
            if first_odd_digit_big(&z).is_none() {
                solutions.push(n);
            }
        }
    }
    solutions.sort_unstable();
    solutions
}

/// 1..=limit の全指数を総当たりで調べる
pub fn brute_force_solutions(digits: u32, limit: u64) -> Vec<u64> {
    let modulus = power_of_ten(digits);
    let mut z = BigUint::one();
    let mut solutions = Vec::new();
    for n in 1..=limit {
        z <<= 1u32;
        z %= &modulus;
        if first_odd_digit_big(&z).is_none() {
            solutions.push(n);
        }
    }
    solutions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_odd_digit_big() {
        assert_eq!(first_odd_digit_big(&BigUint::zero()), None);
        assert_eq!(first_odd_digit_big(&BigUint::from(2048u32)), None);
        assert_eq!(first_odd_digit_big(&BigUint::from(16u32)), Some(1));
        let big = BigUint::from(7u32) * power_of_ten(90);
        assert_eq!(first_odd_digit_big(&big), Some(90));
    }

    #[test]
    fn test_brute_force_small() {
        assert_eq!(brute_force_solutions(50, 100), vec![1, 2, 3, 6, 11]);
        // 下位 1 桁なら偶数しか出ない
        assert_eq!(brute_force_solutions(1, 10).len(), 10);
    }

    #[test]
    fn test_reference_matches_brute_force() {
        let accel = LoopAccelerator::from_cycle(2, 20, 2, vec![3, 6, 10, 11, 19]).unwrap();
        assert_eq!(reference_solutions(50, &accel, 400), brute_force_solutions(50, 400));
    }
}
