//! 固定幅の多倍長整数。
//!
//! `Wide` は 2^32 進の桁を 8 つ並べた 256 ビット整数。各桁は u64 セルに
//! 格納するので、桁同士の積にキャリーを足しても 64 ビットに収まる。
//! `DoubleWide` は 16 桁で、`Wide` 同士の全幅乗算の結果としてのみ現れ、
//! すぐに法で簡約されて `Wide` に戻る。
//!
//! 正規化条件: すべてのセルが 2^32 未満。公開 API は正規化済みの値を受け取り、
//! 正規化済みの値を返す。乗算・除算の途中では一時的に崩れるが、戻る前に
//! キャリー伝播で正規化し直す。

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use num_bigint::BigUint;

use crate::error::ArithError;

/// `Wide` の桁数
pub const LIMBS: usize = 8;
/// `DoubleWide` の桁数
pub const DOUBLE_LIMBS: usize = 2 * LIMBS;
/// `Wide` のビット幅
pub const BITS: usize = 32 * LIMBS;
/// 10^d が `Wide` に収まる最大の d
pub const MAX_DECIMAL_DIGITS: u32 = 77;

const DIGIT_MASK: u64 = 0xFFFF_FFFF;

pub(crate) const TEN: NonZeroU32 = match NonZeroU32::new(10) {
    Some(ten) => ten,
    None => unreachable!(),
};

/// 256 ビット固定幅整数（2^32 進 8 桁、LSB 順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Wide {
    cells: [u64; LIMBS],
}

/// 512 ビット固定幅整数。全幅乗算の中間値専用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DoubleWide {
    cells: [u64; DOUBLE_LIMBS],
}

impl Wide {
    pub const ZERO: Wide = Wide { cells: [0; LIMBS] };
    pub const ONE: Wide = Wide::from_digits([1, 0, 0, 0, 0, 0, 0, 0]);

    /// 2^32 進の桁列（LSB 順）から構築
    pub const fn from_digits(digits: [u32; LIMBS]) -> Self {
        let mut cells = [0u64; LIMBS];
        let mut i = 0;
        while i < LIMBS {
            cells[i] = digits[i] as u64;
            i += 1;
        }
        Wide { cells }
    }

    pub const fn from_u64(n: u64) -> Self {
        let mut cells = [0u64; LIMBS];
        cells[0] = n & DIGIT_MASK;
        cells[1] = n >> 32;
        Wide { cells }
    }

    /// 2^32 進の桁列（LSB 順）
    pub fn digits(&self) -> [u32; LIMBS] {
        let mut digits = [0u32; LIMBS];
        for (d, &c) in digits.iter_mut().zip(self.cells.iter()) {
            *d = c as u32;
        }
        digits
    }

    /// 10^d。d > 77 は 256 ビットに収まらない
    pub fn power_of_ten(d: u32) -> Result<Self, ArithError> {
        let mut z = Wide::ONE;
        for _ in 0..d {
            if z.overflowing_mul_small(10) {
                return Err(ArithError::Overflow);
            }
        }
        Ok(z)
    }

    pub fn is_zero(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    /// 値が u64 に収まれば返す
    pub fn to_u64(&self) -> Option<u64> {
        if self.cells[2..].iter().any(|&c| c != 0) {
            return None;
        }
        Some(self.cells[0] | (self.cells[1] << 32))
    }

    /// ビット i が立っているか（LSB = 0）
    #[inline]
    pub fn bit(&self, i: usize) -> bool {
        if i >= BITS {
            return false;
        }
        (self.cells[i / 32] >> (i % 32)) & 1 == 1
    }

    /// 有効ビット長（0 なら 0）
    pub fn bit_len(&self) -> usize {
        match top_cell(&self.cells) {
            Some(i) => 32 * i + (64 - self.cells[i].leading_zeros() as usize),
            None => 0,
        }
    }

    /// `self += b`。256 ビットを超えた分は捨てる。
    pub fn add_small(&mut self, b: u32) {
        self.overflowing_add_small(b);
    }

    /// `self += b` を行い、256 ビットからあふれたら true を返す
    pub fn overflowing_add_small(&mut self, b: u32) -> bool {
        let mut carry = b as u64;
        for c in self.cells.iter_mut() {
            if carry == 0 {
                break;
            }
            let u = *c + carry;
            *c = u & DIGIT_MASK;
            carry = u >> 32;
        }
        carry != 0
    }

    /// 範囲検査付きの `add_small`。b >= 2^32 は `OutOfRange`
    pub fn checked_add_small(&mut self, b: u64) -> Result<(), ArithError> {
        let b = u32::try_from(b).map_err(|_| ArithError::OutOfRange { value: b })?;
        self.add_small(b);
        Ok(())
    }

    /// `self *= b`。256 ビットを超えた分は捨てる。
    pub fn mul_small(&mut self, b: u32) {
        self.overflowing_mul_small(b);
    }

    /// `self *= b` を行い、256 ビットからあふれたら true を返す
    pub fn overflowing_mul_small(&mut self, b: u32) -> bool {
        let b = b as u64;
        let mut carry = 0u64;
        for c in self.cells.iter_mut() {
            // (2^32-1)^2 + (2^32-1) < 2^64
            let u = *c * b + carry;
            *c = u & DIGIT_MASK;
            carry = u >> 32;
        }
        carry != 0
    }

    /// 範囲検査付きの `mul_small`。b >= 2^32 は `OutOfRange`
    pub fn checked_mul_small(&mut self, b: u64) -> Result<(), ArithError> {
        let b = u32::try_from(b).map_err(|_| ArithError::OutOfRange { value: b })?;
        self.mul_small(b);
        Ok(())
    }

    /// `self /= b` を行い余りを返す。
    ///
    /// 上位桁から順に割り、最後にキャリー伝播を1回だけ行って商を正規化する。
    #[inline]
    pub fn div_mod_small(&mut self, b: NonZeroU32) -> u32 {
        let b = b.get() as u64;
        let mut rem = 0u64;
        for c in self.cells.iter_mut().rev() {
            // rem < b < 2^32 なので (rem << 32) + c は 64 ビットに収まる
            let u = (rem << 32) + *c;
            *c = u / b;
            rem = u % b;
        }
        normalize_cells(&mut self.cells);
        rem as u32
    }

    /// 範囲検査付きの `div_mod_small`。b = 0 は `DivideByZero`、b >= 2^32 は `OutOfRange`
    pub fn checked_div_mod_small(&mut self, b: u64) -> Result<u32, ArithError> {
        let narrow = u32::try_from(b).map_err(|_| ArithError::OutOfRange { value: b })?;
        let divisor = NonZeroU32::new(narrow).ok_or(ArithError::DivideByZero)?;
        Ok(self.div_mod_small(divisor))
    }

    /// `self %= modulus`（Wide ÷ Wide）
    pub fn reduce(&mut self, modulus: &Wide) -> Result<(), ArithError> {
        reduce_cells(&mut self.cells, &modulus.cells)
    }

    /// 全幅乗算。結果は最大 512 ビット
    pub fn mul_full(&self, other: &Wide) -> DoubleWide {
        let mut r = [0u64; DOUBLE_LIMBS];
        for (i, &x) in self.cells.iter().enumerate() {
            if x == 0 {
                continue;
            }
            // r の各セルは正規化済み (< 2^32) なので積を1つ足しても 64 ビットに収まる
            for (j, &y) in other.cells.iter().enumerate() {
                r[i + j] += x * y;
            }
            let escaped = normalize_cells(&mut r[i..]);
            debug_assert_eq!(escaped, 0, "product of two 256-bit values exceeded 512 bits");
        }
        DoubleWide { cells: r }
    }

    /// `self = self * other mod modulus`
    pub fn mul_mod(&mut self, other: &Wide, modulus: &Wide) -> Result<(), ArithError> {
        let mut z = self.mul_full(other);
        z.reduce(modulus)?;
        *self = z.to_wide().ok_or(ArithError::InvariantViolation {
            context: "reduced product does not fit in 256 bits",
        })?;
        Ok(())
    }

    /// `self = self^2 mod modulus`
    pub fn square_mod(&mut self, modulus: &Wide) -> Result<(), ArithError> {
        let x = *self;
        self.mul_mod(&x, modulus)
    }

    pub fn from_biguint(n: &BigUint) -> Result<Self, ArithError> {
        let digits = n.to_u32_digits();
        if digits.len() > LIMBS {
            return Err(ArithError::Overflow);
        }
        let mut cells = [0u64; LIMBS];
        for (c, &d) in cells.iter_mut().zip(digits.iter()) {
            *c = d as u64;
        }
        Ok(Wide { cells })
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_slice(&self.digits())
    }
}

impl From<u64> for Wide {
    fn from(n: u64) -> Self {
        Wide::from_u64(n)
    }
}

impl Ord for Wide {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_cells(&self.cells, &other.cells)
    }
}

impl PartialOrd for Wide {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 10 で割り続けて余りを集め、逆順に並べる
impl fmt::Display for Wide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.pad("0");
        }
        let mut z = *self;
        let mut digits = Vec::with_capacity(MAX_DECIMAL_DIGITS as usize + 1);
        while !z.is_zero() {
            digits.push(z.div_mod_small(TEN));
        }
        let s: String = digits
            .iter()
            .rev()
            .map(|&d| char::from(b'0' + d as u8))
            .collect();
        f.pad(&s)
    }
}

/// 10 進文字列から復元（×10 + 桁）。256 ビットを超えると `Overflow`
impl FromStr for Wide {
    type Err = ArithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ArithError::EmptyInput);
        }
        let mut z = Wide::ZERO;
        for ch in s.chars() {
            let d = ch.to_digit(10).ok_or(ArithError::InvalidDigit { digit: ch })?;
            if z.overflowing_mul_small(10) || z.overflowing_add_small(d) {
                return Err(ArithError::Overflow);
            }
        }
        Ok(z)
    }
}

impl DoubleWide {
    pub const fn from_digits(digits: [u32; DOUBLE_LIMBS]) -> Self {
        let mut cells = [0u64; DOUBLE_LIMBS];
        let mut i = 0;
        while i < DOUBLE_LIMBS {
            cells[i] = digits[i] as u64;
            i += 1;
        }
        DoubleWide { cells }
    }

    pub fn digits(&self) -> [u32; DOUBLE_LIMBS] {
        let mut digits = [0u32; DOUBLE_LIMBS];
        for (d, &c) in digits.iter_mut().zip(self.cells.iter()) {
            *d = c as u32;
        }
        digits
    }

    /// `Wide` との大小比較
    pub fn cmp_wide(&self, other: &Wide) -> Ordering {
        cmp_cells(&self.cells, &other.cells)
    }

    /// `self %= modulus`（DoubleWide ÷ Wide）
    pub fn reduce(&mut self, modulus: &Wide) -> Result<(), ArithError> {
        reduce_cells(&mut self.cells, &modulus.cells)
    }

    /// 上位 8 桁がすべて 0 なら下位半分を `Wide` として返す
    pub fn to_wide(&self) -> Option<Wide> {
        let (low, high) = self.cells.split_at(LIMBS);
        if high.iter().any(|&c| c != 0) {
            return None;
        }
        let mut cells = [0u64; LIMBS];
        cells.copy_from_slice(low);
        Some(Wide { cells })
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_slice(&self.digits())
    }
}

impl Ord for DoubleWide {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_cells(&self.cells, &other.cells)
    }
}

impl PartialOrd for DoubleWide {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 最上位の非ゼロセルの位置
#[inline]
fn top_cell(cells: &[u64]) -> Option<usize> {
    cells.iter().rposition(|&c| c != 0)
}

/// 長さの異なるセル列を数値として比較（足りない桁は 0）
fn cmp_cells(a: &[u64], b: &[u64]) -> Ordering {
    for k in (0..a.len().max(b.len())).rev() {
        let x = a.get(k).copied().unwrap_or(0);
        let y = b.get(k).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    Ordering::Equal
}

/// キャリー伝播で正規化し、最上位からあふれたキャリーを返す。
/// キャリーが 0 になった時点で打ち切る。
#[inline]
fn normalize_cells(cells: &mut [u64]) -> u64 {
    // ループ不変条件: carry <= 2^32
    let mut carry = 0u64;
    for c in cells.iter_mut() {
        if carry == 0 && *c <= DIGIT_MASK {
            continue;
        }
        let u = (*c & DIGIT_MASK) + carry;
        carry = (*c >> 32) + (u >> 32);
        *c = u & DIGIT_MASK;
    }
    carry
}

/// `a %= b` を破壊的に計算する長除法。`Wide` と `DoubleWide` で共用。
///
/// 先頭 1〜2 セルから 64 ビットの見積もり窓を作り、商の桁を
/// `m = ax / (bx + 1)` で下から見積もる（+1 により過大にならない）。
/// `m · b · 2^(32·offset)` を a から引き、a < b になるまで繰り返す。
///
/// 見積もりが 0 になるのは先頭窓が一致したときだけで、
/// a と b の最上位セル位置が同じなら a >= b なので m = 1 を強制してよい。
/// 位置が異なる場合は除数側の窓を 1 セルに狭めて 1 桁下で見積もり直す。
fn reduce_cells(a: &mut [u64], b: &[u64]) -> Result<(), ArithError> {
    let j = top_cell(b).ok_or(ArithError::DivideByZero)?;

    if j == 0 {
        // 1 セルの法は Horner 法で余りだけを求める
        let d = b[0];
        let rem = a.iter().rev().fold(0u64, |rem, &c| ((rem << 32) | c) % d);
        a.fill(0);
        a[0] = rem;
        return Ok(());
    }

    while let Some(i) = top_cell(a) {
        if i < j || (i == j && cmp_cells(a, b) == Ordering::Less) {
            break;
        }

        // i >= j >= 1
        let ax = (a[i] << 32) | a[i - 1];
        let narrow_bx = b[j] + 1;
        let wide_bx = (((b[j] << 32) | b[j - 1]) as u128) + 1;

        let (m, offset) = if a[i] >= b[j] {
            match (ax as u128 / wide_bx) as u64 {
                0 if i == j => (1, 0),
                0 => (ax / narrow_bx, i - j - 1),
                m => (m, i - j),
            }
        } else {
            // a[i] < b[j] かつ a >= b なので i > j
            (ax / narrow_bx, i - j - 1)
        };

        sub_scaled(a, b, m, offset)?;
    }
    Ok(())
}

/// `a -= m · b · 2^(32·offset)`。m < 2^32。
/// 乗算キャリーかボローが a の外へ漏れたら `InvariantViolation`。
fn sub_scaled(a: &mut [u64], b: &[u64], m: u64, offset: usize) -> Result<(), ArithError> {
    debug_assert!(m <= DIGIT_MASK);
    let mut carry = 0u64;
    let mut borrow = 0i64;
    for k in offset..a.len() {
        let idx = k - offset;
        if idx >= b.len() && carry == 0 && borrow == 0 {
            return Ok(());
        }
        let prod = b.get(idx).map_or(0, |&x| x * m) + carry;
        carry = prod >> 32;
        let diff = a[k] as i64 - (prod & DIGIT_MASK) as i64 + borrow;
        a[k] = (diff as u64) & DIGIT_MASK;
        borrow = diff >> 32;
    }
    if carry != 0 || borrow != 0 {
        return Err(ArithError::InvariantViolation {
            context: "scaled subtraction escaped the reduction window",
        });
    }
    Ok(())
}
