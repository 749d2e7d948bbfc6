//! Reply texts and keyboards. Plain text, no chat markup.

use crate::bot::engine::Conversion;
use crate::core::chat::{Button, ButtonAction, Keyboard};
use crate::core::{ChatUser, CurrencyCode, RateTable, Reply};

pub const SPARKLES: &str = "✨";
pub const EXCHANGE: &str = "💱";
pub const CHART: &str = "📊";
pub const MONEY: &str = "💰";
pub const GLOBE: &str = "🌍";
pub const ROCKET: &str = "🚀";
pub const INFORMATION: &str = "ℹ️";

const KEYBOARD_COLUMNS: usize = 3;

const REGIONAL_INDICATOR_OFFSET: u32 = 0x1F1E6 - 'A' as u32;

/// Flag emoji built from the first two letters of the code
pub fn currency_flag(code: &CurrencyCode) -> String {
    let flag: Option<String> = code
        .as_str()
        .chars()
        .take(2)
        .map(|c| char::from_u32(c as u32 + REGIONAL_INDICATOR_OFFSET))
        .collect();
    flag.unwrap_or_else(|| MONEY.to_string())
}

pub fn currency_symbol(code: &CurrencyCode) -> Option<&'static str> {
    Some(match code.as_str() {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" | "CNY" => "¥",
        "CAD" => "C$",
        "AUD" => "A$",
        "CHF" => "Fr",
        "INR" => "₹",
        "BTC" => "₿",
        _ => return None,
    })
}

pub fn format_money(amount: f64, code: &CurrencyCode) -> String {
    let symbol = currency_symbol(code).unwrap_or(code.as_str());
    format!("{symbol} {amount:.2}")
}

pub fn currency_name(code: &CurrencyCode) -> Option<&'static str> {
    Some(match code.as_str() {
        "USD" => "US Dollar",
        "EUR" => "Euro",
        "GBP" => "British Pound",
        "JPY" => "Japanese Yen",
        "AUD" => "Australian Dollar",
        "CAD" => "Canadian Dollar",
        "CHF" => "Swiss Franc",
        "CNY" => "Chinese Yuan",
        "HKD" => "Hong Kong Dollar",
        "NZD" => "New Zealand Dollar",
        "SEK" => "Swedish Krona",
        "KRW" => "South Korean Won",
        "SGD" => "Singapore Dollar",
        "NOK" => "Norwegian Krone",
        "MXN" => "Mexican Peso",
        "INR" => "Indian Rupee",
        "RUB" => "Russian Ruble",
        "ZAR" => "South African Rand",
        "TRY" => "Turkish Lira",
        "BRL" => "Brazilian Real",
        "TWD" => "Taiwan Dollar",
        "DKK" => "Danish Krone",
        "PLN" => "Polish Zloty",
        "THB" => "Thai Baht",
        "IDR" => "Indonesian Rupiah",
        "HUF" => "Hungarian Forint",
        "CZK" => "Czech Koruna",
        "ILS" => "Israeli Shekel",
        "CLP" => "Chilean Peso",
        "PHP" => "Philippine Peso",
        "AED" => "UAE Dirham",
        "COP" => "Colombian Peso",
        "SAR" => "Saudi Riyal",
        "MYR" => "Malaysian Ringgit",
        "RON" => "Romanian Leu",
        "BTC" => "Bitcoin",
        _ => return None,
    })
}

fn referral_keyboard(label: String, link: Option<&str>) -> Option<Keyboard> {
    link.map(|url| Keyboard {
        rows: vec![vec![Button {
            label,
            action: ButtonAction::Url(url.to_string()),
        }]],
    })
}

fn with_referral(reply: Reply, label: String, link: Option<&str>) -> Reply {
    match referral_keyboard(label, link) {
        Some(keyboard) => reply.with_keyboard(keyboard),
        None => reply,
    }
}

pub fn currency_keyboard(currencies: &[CurrencyCode]) -> Keyboard {
    let rows = currencies
        .chunks(KEYBOARD_COLUMNS)
        .map(|chunk| {
            chunk
                .iter()
                .map(|code| Button {
                    label: format!("{} {}", currency_flag(code), code),
                    action: ButtonAction::Callback(code.to_string()),
                })
                .collect()
        })
        .collect();
    Keyboard { rows }
}

pub fn welcome(user: &ChatUser, referral: Option<&str>) -> Reply {
    let text = format!(
        "{SPARKLES} Welcome to CurrenzBot! {SPARKLES}\n\n\
         Hello {}! I'm your currency exchange assistant. {EXCHANGE}\n\n\
         Here's what I can do for you:\n\
         {CHART} Check exchange rates\n\
         {MONEY} Convert between currencies\n\
         {GLOBE} View supported currencies\n\n\
         Quick Tip: You can directly type your conversion request like:\n\
         100 USD to EUR or 50 USDT to BDT\n\n\
         Use /help to see all available commands.",
        user.display_name()
    );
    with_referral(
        Reply::text(text),
        format!("{ROCKET} Convert currency with best rate"),
        referral,
    )
}

pub fn help() -> Reply {
    Reply::text(format!(
        "{INFORMATION} CurrenzBot Help {INFORMATION}\n\n\
         Here are the commands you can use:\n\n\
         /start - Start the bot and get a welcome message\n\
         /help - Show this help message\n\
         /rates [currency] - Get exchange rates for a base currency\n\
         /convert - Start currency conversion wizard\n\
         /cancel - Cancel the conversion wizard\n\
         /currencies - List all supported currencies\n\
         /compare [currency] [target1] [target2] ... - Compare a base currency to others\n\n\
         Direct Conversion:\n\
         Simply type your request in this format:\n\
         amount from_currency to to_currency\n\
         Example: 100 USD to EUR or 50 USDT in BDT"
    ))
}

pub fn not_understood() -> Reply {
    Reply::text(
        "I'm not sure what you mean. Here are some examples of what you can ask:\n\n\
         • 100 USD to EUR\n\
         • 50 USDT in BDT\n\
         • Convert 200 JPY to CAD\n\n\
         Or use /help to see all available commands.",
    )
}

pub fn conversion(conversion: &Conversion, referral: Option<&str>) -> Reply {
    let Conversion {
        amount,
        source,
        target,
        result,
    } = conversion;
    let text = format!(
        "{EXCHANGE} Currency Conversion\n\n\
         {amount:.2} {} {source} = {result:.2} {} {target}\n\n\
         Exchange rate: 1 {source} = {:.4} {target}\n\
         Total: {}",
        currency_flag(source),
        currency_flag(target),
        conversion.rate(),
        format_money(*result, target),
    );
    with_referral(
        Reply::text(text),
        format!("{ROCKET} Convert with best rate"),
        referral,
    )
}

pub fn conversion_failed(source: &CurrencyCode, target: &CurrencyCode) -> Reply {
    Reply::text(format!(
        "Sorry, I couldn't convert {source} to {target}. \
         Please check the currency codes or try again later."
    ))
}

pub fn unknown_currency(code: &CurrencyCode) -> Reply {
    Reply::text(format!(
        "Sorry, {code} is not a currency I know. Use /currencies to see the supported ones."
    ))
}

pub fn invalid_code(raw: &str) -> Reply {
    Reply::text(format!(
        "'{raw}' is not a currency code. Codes have 3 or 4 letters, like USD or USDT."
    ))
}

pub fn try_again_later() -> Reply {
    Reply::text(
        "Sorry, I couldn't reach the exchange rate service right now. \
         Please try again later.",
    )
}

pub fn rates(table: &RateTable, popular: &[CurrencyCode], referral: Option<&str>) -> Reply {
    let base = &table.base;
    let mut text = format!(
        "{} {base} Exchange Rates\n\nPopular Currencies:\n",
        currency_flag(base)
    );
    for code in popular.iter().filter(|c| *c != base) {
        if let Some(rate) = table.rate(code) {
            text.push_str(&format!("{} {code}: {rate:.4}\n", currency_flag(code)));
        }
    }
    text.push_str("\nOther Currencies:\n");
    for (code, rate) in &table.rates {
        if code != base && !popular.contains(code) {
            text.push_str(&format!("{} {code}: {rate:.4}\n", currency_flag(code)));
        }
    }
    with_referral(
        Reply::text(text.trim_end()),
        format!("{ROCKET} Convert {base} with best rate"),
        referral,
    )
}

pub fn rates_unavailable(base: &CurrencyCode) -> Reply {
    Reply::text(format!(
        "Sorry, I couldn't get exchange rates for {base}. Please try a different currency code."
    ))
}

/// Lists every code in `table` plus the popular ones, popular first
pub fn currencies(table: &RateTable, popular: &[CurrencyCode]) -> Reply {
    let describe = |code: &CurrencyCode| {
        let name = currency_name(code)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{code} Currency"));
        format!("{} {code} - {name}\n", currency_flag(code))
    };

    let mut text = format!("{GLOBE} Supported Currencies\n\nPopular Currencies:\n");
    for code in popular {
        text.push_str(&describe(code));
    }
    text.push_str("\nOther Currencies:\n");
    for code in table.rates.keys().filter(|c| !popular.contains(*c)) {
        text.push_str(&describe(code));
    }
    Reply::text(text.trim_end())
}

pub fn currencies_unavailable() -> Reply {
    Reply::text(
        "Sorry, I couldn't get the list of supported currencies. Please try again later.",
    )
}

pub fn compare_usage() -> Reply {
    Reply::text(
        "Please provide a base currency and at least one target currency to compare.\n\
         Example: /compare USD EUR GBP JPY",
    )
}

pub fn comparison(
    base: &CurrencyCode,
    entries: &[(CurrencyCode, f64)],
    referral: Option<&str>,
) -> Reply {
    let mut text = format!(
        "{CHART} Currency Comparison\n\nBase currency: {} {base}\n\n",
        currency_flag(base)
    );
    for (code, rate) in entries {
        text.push_str(&format!("{} {code}: {rate:.4}\n", currency_flag(code)));
    }
    with_referral(
        Reply::text(text.trim_end()),
        format!("{ROCKET} Convert {base} with best rate"),
        referral,
    )
}

pub fn comparison_empty(base: &CurrencyCode) -> Reply {
    Reply::text(format!(
        "Sorry, I couldn't compare {base} to the target currencies. \
         Please check the currency codes and try again."
    ))
}

pub fn choose_base(popular: &[CurrencyCode]) -> Reply {
    Reply::text("Please select the base currency (from):")
        .with_keyboard(currency_keyboard(popular))
}

pub fn choose_target(base: &CurrencyCode, popular: &[CurrencyCode]) -> Reply {
    Reply::text(format!(
        "Base currency: {} {base}\n\nNow, please select the target currency (to):",
        currency_flag(base)
    ))
    .with_keyboard(currency_keyboard(popular))
}

pub fn enter_amount(base: &CurrencyCode, target: &CurrencyCode) -> Reply {
    Reply::text(format!(
        "Base currency: {} {base}\nTarget currency: {} {target}\n\n\
         Please enter the amount to convert:",
        currency_flag(base),
        currency_flag(target)
    ))
}

pub fn invalid_amount() -> Reply {
    Reply::text("Please enter a valid positive number for the amount.")
}

pub fn cancelled() -> Reply {
    Reply::text("Conversion cancelled. If you need anything else, just ask!")
}

pub fn no_active_flow() -> Reply {
    Reply::text("There is no conversion in progress. Use /convert to start one.")
}

pub fn unexpected_step() -> Reply {
    Reply::text(
        "That selection doesn't fit this step of the conversion. \
         Follow the last prompt or use /cancel to start over.",
    )
}

pub fn unknown_command(name: &str) -> Reply {
    Reply::text(format!(
        "Sorry, I don't know the /{name} command. Use /help to see all available commands."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn code(raw: &str) -> CurrencyCode {
        CurrencyCode::new(raw).unwrap()
    }

    #[test]
    fn test_flag_from_country_prefix() {
        assert_eq!(currency_flag(&code("USD")), "🇺🇸");
        assert_eq!(currency_flag(&code("eur")), "🇪🇺");
    }

    #[test]
    fn test_format_money_uses_symbol_or_code() {
        assert_eq!(format_money(12.5, &code("GBP")), "£ 12.50");
        assert_eq!(format_money(5525.0, &code("BDT")), "BDT 5525.00");
    }

    #[test]
    fn test_keyboard_has_three_columns() {
        let codes: Vec<_> = ["USD", "EUR", "GBP", "JPY", "CAD"]
            .into_iter()
            .map(code)
            .collect();
        let keyboard = currency_keyboard(&codes);

        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(keyboard.rows[0].len(), 3);
        assert_eq!(keyboard.rows[1].len(), 2);
        assert_eq!(
            keyboard.rows[1][1].action,
            ButtonAction::Callback("CAD".to_string())
        );
    }

    #[test]
    fn test_conversion_text() {
        let reply = conversion(
            &Conversion {
                amount: 50.0,
                source: code("USDT"),
                target: code("BDT"),
                result: 5525.0,
            },
            Some("https://example.com/invite"),
        );

        assert!(reply.text.contains("50.00 🇺🇸 USDT = 5525.00 🇧🇩 BDT"));
        assert!(reply.text.contains("Exchange rate: 1 USDT = 110.5000 BDT"));
        assert!(reply.text.ends_with("Total: BDT 5525.00"));
        let keyboard = reply.keyboard.unwrap();
        assert_eq!(
            keyboard.rows[0][0].action,
            ButtonAction::Url("https://example.com/invite".to_string())
        );
    }

    #[test]
    fn test_rates_lists_popular_first_and_skips_base() {
        let table = RateTable::new(
            code("USD"),
            BTreeMap::from([
                (code("AED"), 3.6725),
                (code("EUR"), 0.92),
                (code("USD"), 1.0),
            ]),
        );
        let reply = rates(&table, &[code("USD"), code("EUR")], None);

        let popular_at = reply.text.find("EUR: 0.9200").unwrap();
        let other_at = reply.text.find("AED: 3.6725").unwrap();
        assert!(popular_at < other_at);
        assert!(!reply.text.contains("USD: 1.0000"));
        assert!(reply.keyboard.is_none());
    }

    #[test]
    fn test_currencies_names_unknown_codes() {
        let table = RateTable::new(
            code("USD"),
            BTreeMap::from([(code("BDT"), 110.0), (code("EUR"), 0.9)]),
        );
        let reply = currencies(&table, &[code("EUR")]);

        assert!(reply.text.contains("EUR - Euro"));
        assert!(reply.text.contains("BDT - BDT Currency"));
        assert_eq!(reply.text.matches("EUR - Euro").count(), 1);
    }
}
