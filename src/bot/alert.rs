//! Fixed-template rendering of indicator alerts for chat delivery (HTML parse mode).

use crate::events::IndicatorAlert;
use crate::locale::Locale;

/// Renders the alert body sent to a linked chat.
pub fn format_alert_message(alert: &IndicatorAlert, brand: &str, link_base: &str) -> String {
    let symbol = escape_html(&alert.symbol.to_uppercase());
    let price = Locale::English.format_decimal(alert.close_price);
    let candle = if alert.is_realtime() {
        "Realtime"
    } else {
        "Candle Close"
    };
    let link = format!(
        "{}/{}",
        link_base.trim_end_matches('/'),
        escape_html(&alert.symbol)
    );

    format!(
        "<b>{brand} ALERT - ${symbol}</b>\n\
         💰 Price: <b>${price}</b>\n\
         🕘 Time Frame: <b>{time_frame}</b>\n\
         📈 Signal: <b>{signal}</b>\n\
         🕹 Candle conditions: <b>{candle}</b>\n\
         <b><a href=\"{link}\">Visit on {brand}</a></b>",
        brand = escape_html(brand),
        time_frame = escape_html(&alert.time_frame.to_uppercase()),
        signal = escape_html(&alert.signal.to_uppercase()),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
