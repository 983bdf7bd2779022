use std::str::FromStr;

const MAX_DIGITS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculatorKey {
    Digit(char),
    Back,
    Add,
}

impl FromStr for CalculatorKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "back" => Ok(CalculatorKey::Back),
            "add" => Ok(CalculatorKey::Add),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_digit() => Ok(CalculatorKey::Digit(c)),
                    _ => Err(format!("unknown calculator key: {}", s)),
                }
            }
        }
    }
}

/// Amount keypad next to a product
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calculator {
    input: String,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns the amount to add to the cart when `Add` is pressed on a
    /// positive number. `Add` always clears the field.
    pub fn press(&mut self, key: CalculatorKey) -> Option<u32> {
        match key {
            CalculatorKey::Digit(digit) => {
                if self.input.len() < MAX_DIGITS {
                    self.input.push(digit);
                }
                None
            }
            CalculatorKey::Back => {
                self.input.pop();
                None
            }
            CalculatorKey::Add => {
                let amount = self.input.parse::<u32>().ok().filter(|n| *n > 0);
                self.input.clear();
                amount
            }
        }
    }
}
