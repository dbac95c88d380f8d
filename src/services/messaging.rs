//! WhatsApp checkout handoff.
//!
//! The storefront opens the returned `wa.me` link in a new tab; delivery of the
//! message is not tracked.

use crate::{
    config::ContactConfig,
    entities::{order, order_item},
    errors::ServiceError,
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write;
use url::Url;

/// Formats an amount the way Argentine storefronts print prices: `$ 1.234,56`
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .abs();
    let text = format!("{:.2}", rounded);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}$ {},{}", sign, grouped, frac_part)
}

/// Plain-text order summary sent to the shop's WhatsApp number.
///
/// Lines are printed at list price so they add up to the subtotal.
pub fn order_message(order: &order::Model, items: &[order_item::Model]) -> String {
    let mut msg = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(msg, "¡Hola! Quiero realizar el siguiente pedido:");
    let _ = writeln!(msg, "Pedido: {}", order.order_number);
    let _ = writeln!(msg);

    for item in items {
        let _ = writeln!(
            msg,
            "- {} x{} = {}",
            item.product_name,
            item.quantity,
            format_money(item.gross_total())
        );
    }

    let _ = writeln!(msg);
    let _ = writeln!(msg, "Subtotal: {}", format_money(order.subtotal));
    if !order.discount_amount.is_zero() {
        let _ = writeln!(msg, "Descuento: -{}", format_money(order.discount_amount));
    }
    let _ = writeln!(msg, "Total: {}", format_money(order.total));
    let _ = writeln!(msg);
    let _ = writeln!(msg, "Nombre: {}", order.customer_name);
    let _ = writeln!(msg, "Teléfono: {}", order.customer_phone);
    if let Some(email) = &order.customer_email {
        let _ = writeln!(msg, "Email: {}", email);
    }
    if let Some(address) = &order.delivery_address {
        let _ = writeln!(msg, "Dirección de entrega: {}", address);
    }
    if let Some(notes) = &order.notes {
        let _ = writeln!(msg, "Notas: {}", notes);
    }

    msg.trim_end().to_string()
}

/// `https://wa.me/<digits>?text=<urlencoded text>`
pub fn whatsapp_link(contact: &ContactConfig, text: &str) -> Result<String, ServiceError> {
    let digits = contact.whatsapp_digits();
    if digits.is_empty() {
        return Err(ServiceError::Configuration(
            "contact.whatsapp_phone has no digits".to_string(),
        ));
    }

    let url = Url::parse_with_params(&format!("https://wa.me/{}", digits), &[("text", text)])
        .map_err(|e| ServiceError::InternalError(format!("invalid WhatsApp link: {}", e)))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn money_uses_dot_thousands_and_comma_decimals() {
        assert_eq!(format_money(dec!(1234.56)), "$ 1.234,56");
        assert_eq!(format_money(dec!(0)), "$ 0,00");
        assert_eq!(format_money(dec!(999)), "$ 999,00");
        assert_eq!(format_money(dec!(1000000)), "$ 1.000.000,00");
        assert_eq!(format_money(dec!(12.345)), "$ 12,35");
        assert_eq!(format_money(dec!(-50.5)), "-$ 50,50");
    }

    #[test]
    fn link_contains_digits_and_encoded_text() {
        let contact = ContactConfig {
            whatsapp_phone: "+54 9 11 5555-0000".into(),
            ..ContactConfig::default()
        };
        let link = whatsapp_link(&contact, "Hola & chau").unwrap();
        assert!(link.starts_with("https://wa.me/5491155550000?text="));
        assert!(link.contains("Hola"));
        assert!(!link.contains(" & "));
    }

    #[test]
    fn phone_without_digits_is_a_configuration_error() {
        let contact = ContactConfig {
            whatsapp_phone: "n/a".into(),
            ..ContactConfig::default()
        };
        assert!(matches!(
            whatsapp_link(&contact, "x"),
            Err(ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn message_lists_lines_and_totals() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::Model {
            id: order_id,
            order_number: "MY-20240301-ABC123".into(),
            customer_id: None,
            customer_name: "Juan Pérez".into(),
            customer_phone: "1144445555".into(),
            customer_email: None,
            delivery_address: Some("Calle 1".into()),
            notes: None,
            status: crate::entities::OrderStatus::Pending,
            subtotal: dec!(2000),
            discount_amount: dec!(200),
            total: dec!(1800),
            currency: "ARS".into(),
            created_at: now,
            updated_at: now,
        };
        let items = vec![order_item::Model {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            variant_id: None,
            product_name: "Arena fina".into(),
            unit_price: dec!(900),
            quantity: 2,
            line_total: dec!(1800),
            discount_amount: dec!(200),
        }];

        let msg = order_message(&order, &items);
        assert!(msg.contains("MY-20240301-ABC123"));
        assert!(msg.contains("- Arena fina x2 = $ 2.000,00"));
        assert!(msg.contains("Subtotal: $ 2.000,00"));
        assert!(msg.contains("Descuento: -$ 200,00"));
        assert!(msg.contains("Total: $ 1.800,00"));
        assert!(msg.contains("Dirección de entrega: Calle 1"));
    }
}
