use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DArrayError;

/// Worker按元素应用的预定义数学运算。
///
/// 通过线路协议传输时使用 [`Operation::expr`] 的表达式字符串，由Worker解释执行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Identity,
    AddOne,
    SubtractOne,
    MultiplyTwo,
    Square,
    Sqrt,
    Sin,
    Cos,
    Tan,
    SinPlusCos,
    /// 恒等于1，用于数值校验
    SinSquarePlusCosSquare,
    SinPlusCosSquareDivSqrt,
    Exponential,
    LogNatural,
    /// 自定义运算占位符，具体语义由Worker侧定义
    Custom,
}

impl Operation {
    /// Worker侧解释的表达式字符串
    pub fn expr(&self) -> &'static str {
        match self {
            Operation::Identity => "x",
            Operation::AddOne => "x + 1",
            Operation::SubtractOne => "x - 1",
            Operation::MultiplyTwo => "x * 2",
            Operation::Square => "x * x",
            Operation::Sqrt => "sqrt(abs(x))",
            Operation::Sin => "sin(x)",
            Operation::Cos => "cos(x)",
            Operation::Tan => "tan(x)",
            Operation::SinPlusCos => "sin(x) + cos(x)",
            Operation::SinSquarePlusCosSquare => "(sin(x) * sin(x)) + (cos(x) * cos(x))",
            Operation::SinPlusCosSquareDivSqrt => "((sin(x) + cos(x))^2) / (sqrt(abs(x)) + 1)",
            Operation::Exponential => "exp(x)",
            Operation::LogNatural => "log(x)",
            Operation::Custom => "custom",
        }
    }
}

impl Default for Operation {
    fn default() -> Self {
        Operation::Identity
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expr())
    }
}

impl FromStr for Operation {
    type Err = DArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(Operation::Identity),
            "add_one" => Ok(Operation::AddOne),
            "subtract_one" => Ok(Operation::SubtractOne),
            "multiply_two" => Ok(Operation::MultiplyTwo),
            "square" => Ok(Operation::Square),
            "sqrt" => Ok(Operation::Sqrt),
            "sin" => Ok(Operation::Sin),
            "cos" => Ok(Operation::Cos),
            "tan" => Ok(Operation::Tan),
            "sin_plus_cos" => Ok(Operation::SinPlusCos),
            "sin_square_plus_cos_square" => Ok(Operation::SinSquarePlusCosSquare),
            "sin_plus_cos_square_div_sqrt" => Ok(Operation::SinPlusCosSquareDivSqrt),
            "exponential" => Ok(Operation::Exponential),
            "log_natural" => Ok(Operation::LogNatural),
            "custom" => Ok(Operation::Custom),
            other => Err(DArrayError::Configuration(format!(
                "不支持的运算类型: {other}"
            ))),
        }
    }
}
