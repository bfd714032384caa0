//! 法 m のもとでのべき乗。
//!
//! `pow_mod` は指数のビットを LSB から走査する二進法（square-and-multiply）。
//! 同じ底と法で何度もべき乗する場合は `PowerTable` に base^(2^i) を
//! 前計算しておけば、指数の立っているビットの分だけ乗算すれば済む。

use crate::error::ArithError;
use crate::wide::{Wide, BITS};

/// `base^exponent mod modulus`
///
/// 結果は 1 から始め、指数のビットが立っていれば現在の平方を掛ける。
/// 法が 0 なら `DivideByZero`。
pub fn pow_mod(base: &Wide, exponent: &Wide, modulus: &Wide) -> Result<Wide, ArithError> {
    let mut result = Wide::ONE;
    result.reduce(modulus)?;
    let mut square = *base;
    square.reduce(modulus)?;

    let bits = exponent.bit_len();
    for i in 0..bits {
        if exponent.bit(i) {
            result.mul_mod(&square, modulus)?;
        }
        if i + 1 < bits {
            square.square_mod(modulus)?;
        }
    }
    Ok(result)
}

/// 指数が u64 の `pow_mod`
pub fn pow_mod_u64(base: &Wide, exponent: u64, modulus: &Wide) -> Result<Wide, ArithError> {
    pow_mod(base, &Wide::from_u64(exponent), modulus)
}

/// base^(2^i) mod modulus の前計算表（i = 0..256）
#[derive(Debug, Clone)]
pub struct PowerTable {
    powers: Box<[Wide]>,
    modulus: Wide,
}

impl PowerTable {
    /// 平方を繰り返して表を作る
    pub fn new(base: &Wide, modulus: &Wide) -> Result<Self, ArithError> {
        let mut powers = Vec::with_capacity(BITS);
        let mut z = *base;
        z.reduce(modulus)?;
        for i in 0..BITS {
            if i > 0 {
                z.square_mod(modulus)?;
            }
            powers.push(z);
        }
        Ok(PowerTable {
            powers: powers.into_boxed_slice(),
            modulus: *modulus,
        })
    }

    /// base^(2^i) mod modulus
    pub fn get(&self, i: usize) -> Option<&Wide> {
        self.powers.get(i)
    }

    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    pub fn modulus(&self) -> &Wide {
        &self.modulus
    }

    /// 表引きによる `base^exponent mod modulus`。`pow_mod` とビット単位で一致する
    pub fn pow(&self, exponent: &Wide) -> Result<Wide, ArithError> {
        let mut result = Wide::ONE;
        result.reduce(&self.modulus)?;
        for (i, power) in self.powers.iter().enumerate().take(exponent.bit_len()) {
            if exponent.bit(i) {
                result.mul_mod(power, &self.modulus)?;
            }
        }
        Ok(result)
    }

    pub fn pow_u64(&self, exponent: u64) -> Result<Wide, ArithError> {
        self.pow(&Wide::from_u64(exponent))
    }
}
