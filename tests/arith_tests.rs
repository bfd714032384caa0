use even_digits::*;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 下位 `cells` 個のセルだけを埋めた乱数
fn random_wide(rng: &mut StdRng, cells: usize) -> Wide {
    let mut digits = [0u32; LIMBS];
    for d in digits.iter_mut().take(cells) {
        *d = rng.gen();
    }
    Wide::from_digits(digits)
}

fn random_nonzero(rng: &mut StdRng) -> Wide {
    loop {
        let cells = rng.gen_range(1..=LIMBS);
        let w = random_wide(rng, cells);
        if !w.is_zero() {
            return w;
        }
    }
}

/// 剰余の算術検証ヘルパー
fn verify_reduce(a: &Wide, b: &Wide) {
    let mut r = *a;
    r.reduce(b).unwrap();
    let expected = a.to_biguint() % b.to_biguint();
    assert_eq!(r.to_biguint(), expected, "{} mod {}", a, b);
    assert!(r < *b);
}

#[test]
fn test_div_mod_small_roundtrip() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..500 {
        let a = random_nonzero(&mut rng);
        let divisor: u32 = rng.gen_range(1..=u32::MAX);
        let mut q = a;
        let r = q.checked_div_mod_small(divisor as u64).unwrap();
        assert!(r < divisor);
        // q * divisor + r == a
        let mut back = q;
        back.checked_mul_small(divisor as u64).unwrap();
        back.checked_add_small(r as u64).unwrap();
        assert_eq!(back, a);
    }
}

#[test]
fn test_reduce_random() {
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..2000 {
        let a = random_nonzero(&mut rng);
        let b = random_nonzero(&mut rng);
        verify_reduce(&a, &b);
    }
}

#[test]
fn test_reduce_nearly_equal() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..500 {
        let b = random_nonzero(&mut rng);
        let big_b = b.to_biguint();
        // a = b, b-1, b+k, 2b-1, k·b + r
        verify_reduce(&b, &b);
        if big_b > BigUint::one() {
            verify_reduce(&Wide::from_biguint(&(&big_b - 1u32)).unwrap(), &b);
        }
        for k in [1u32, 2, 3, 0xffff_ffff] {
            let candidate = &big_b * k + (&big_b - 1u32);
            if let Ok(a) = Wide::from_biguint(&candidate) {
                verify_reduce(&a, &b);
            }
        }
        let small = rng.gen_range(1u64..1000);
        if let Ok(a) = Wide::from_biguint(&(&big_b + small)) {
            verify_reduce(&a, &b);
        }
    }
}

#[test]
fn test_reduce_matching_leading_cells() {
    // 上位セルが一致し、下位だけが違う組
    let b = Wide::from_digits([5, 0, 0, 7, 0xffff_ffff, 0, 0, 0x8000_0000]);
    let a = Wide::from_digits([4, 1, 0, 7, 0xffff_ffff, 0, 0, 0x8000_0000]);
    verify_reduce(&a, &b);
    verify_reduce(&b, &a);

    let b = Wide::from_digits([0, 0, 1, 0, 0, 0, 0, 0]);
    let a = Wide::from_digits([0xffff_ffff; LIMBS]);
    verify_reduce(&a, &b);
}

#[test]
fn test_reduce_single_cell_modulus() {
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..500 {
        let a = random_nonzero(&mut rng);
        let b = Wide::from_u64(rng.gen_range(1..=u32::MAX as u64));
        verify_reduce(&a, &b);
    }
}

#[test]
fn test_reduce_by_zero() {
    let mut a = Wide::from_u64(17);
    assert_eq!(a.reduce(&Wide::ZERO), Err(ArithError::DivideByZero));
}

#[test]
fn test_mul_mod_random() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..1000 {
        let m = random_nonzero(&mut rng);
        let mut a = random_nonzero(&mut rng);
        let b = random_nonzero(&mut rng);
        a.reduce(&m).unwrap();
        let expected = a.to_biguint() * b.to_biguint() % m.to_biguint();
        a.mul_mod(&b, &m).unwrap();
        assert_eq!(a.to_biguint(), expected);
        assert!(a < m);
    }
}

#[test]
fn test_full_product_reduce() {
    let mut rng = StdRng::seed_from_u64(6);
    for _ in 0..500 {
        let a = random_nonzero(&mut rng);
        let b = random_nonzero(&mut rng);
        let m = random_nonzero(&mut rng);
        let mut p = a.mul_full(&b);
        assert_eq!(p.to_biguint(), a.to_biguint() * b.to_biguint());
        p.reduce(&m).unwrap();
        assert_eq!(p.to_biguint(), a.to_biguint() * b.to_biguint() % m.to_biguint());
        assert!(p.to_wide().is_some());
    }
}

#[test]
fn test_decimal_string_roundtrip() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..300 {
        let cells = rng.gen_range(0..=LIMBS);
        let a = random_wide(&mut rng, cells);
        let text = a.to_string();
        assert_eq!(text, a.to_biguint().to_string());
        assert_eq!(text.parse::<Wide>().unwrap(), a);
    }
}

#[test]
fn test_ordering_matches_padded_decimal() {
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..500 {
        let (ca, cb) = (rng.gen_range(0..=LIMBS), rng.gen_range(0..=LIMBS));
        let a = random_wide(&mut rng, ca);
        let b = random_wide(&mut rng, cb);
        let pa = format!("{:0>78}", a.to_string());
        let pb = format!("{:0>78}", b.to_string());
        assert_eq!(a.cmp(&b), pa.cmp(&pb), "{} vs {}", a, b);
    }
}

#[test]
fn test_pow_mod_random_exponents() {
    let mut rng = StdRng::seed_from_u64(9);
    for digits in [1u32, 9, 30, 55, 77] {
        let m = Wide::power_of_ten(digits).unwrap();
        let table = PowerTable::new(&Wide::from_u64(2), &m).unwrap();
        for _ in 0..20 {
            let e: u64 = rng.gen();
            let expected = BigUint::from(2u32).modpow(&BigUint::from(e), &m.to_biguint());
            assert_eq!(table.pow_u64(e).unwrap().to_biguint(), expected);
            assert_eq!(pow_mod_u64(&Wide::from_u64(2), e, &m).unwrap().to_biguint(), expected);
        }
    }
}

#[test]
fn test_first_odd_digit_agrees_with_biguint() {
    let mut rng = StdRng::seed_from_u64(10);
    let m = Wide::power_of_ten(50).unwrap();
    for _ in 0..300 {
        let mut z = random_wide(&mut rng, LIMBS);
        z.reduce(&m).unwrap();
        assert_eq!(first_odd_digit(z), first_odd_digit_big(&z.to_biguint()));
    }
    assert_eq!(first_odd_digit_big(&BigUint::zero()), first_odd_digit(Wide::ZERO));
}
