//! Email bodies (Vietnamese first, English second)

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::models::{Booking, Order, OrderDetail, Payment};

use super::Email;

fn layout(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:sans-serif\">\
         <h2>{title}</h2>{content}\
         <p style=\"color:#888\">Aqua Shop</p></body></html>"
    )
}

fn money(amount: Decimal) -> String {
    format!("{} VND", amount.round_dp(2).normalize())
}

fn local_date(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(7 * 3600) {
        Some(tz) => at.with_timezone(&tz).format("%d/%m/%Y %H:%M").to_string(),
        None => at.format("%Y-%m-%d %H:%M UTC").to_string(),
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

pub fn order_confirmation(order: &Order, details: &[OrderDetail]) -> Email {
    let rows: String = details
        .iter()
        .map(|d| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                d.product_name,
                d.quantity,
                money(d.line_total())
            )
        })
        .collect();
    let content = format!(
        "<p>Đơn hàng #{id} đã được tạo. / Your order #{id} has been placed.</p>\
         <table>{rows}</table>\
         <p>Tạm tính / Subtotal: {subtotal}<br>Giảm giá / Discount: {discount}<br>\
         Phí vận chuyển / Shipping: {ship}<br><b>Tổng / Total: {due}</b></p>",
        id = short_id(order.id),
        subtotal = money(order.subtotal),
        discount = money(order.discount),
        ship = money(order.ship_cost),
        due = money(order.amount_due()),
    );
    Email {
        subject: format!("Xác nhận đơn hàng / Order confirmation #{}", short_id(order.id)),
        html: layout("Xác nhận đơn hàng / Order confirmation", &content),
    }
}

pub fn payment_receipt(payment: &Payment) -> Email {
    let content = format!(
        "<p>Đã nhận thanh toán {amount} qua {method} (mã {reference}).<br>\
         We received your payment of {amount} via {method} (reference {reference}).</p>",
        amount = money(payment.amount),
        method = payment.method,
        reference = payment.gateway_reference,
    );
    Email {
        subject: "Biên nhận thanh toán / Payment receipt".into(),
        html: layout("Biên nhận thanh toán / Payment receipt", &content),
    }
}

pub fn payment_cancelled(payment: &Payment) -> Email {
    let content = format!(
        "<p>Giao dịch {reference} đã bị hủy do quá hạn thanh toán.<br>\
         Payment {reference} was cancelled because it was not completed in time.</p>",
        reference = payment.gateway_reference,
    );
    Email {
        subject: "Giao dịch đã hủy / Payment cancelled".into(),
        html: layout("Giao dịch đã hủy / Payment cancelled", &content),
    }
}

pub fn refund_started(payment: &Payment) -> Email {
    let content = format!(
        "<p>Chúng tôi đang hoàn lại {amount} cho giao dịch {reference}.<br>\
         A refund of {amount} for payment {reference} is being processed.</p>",
        amount = money(payment.amount),
        reference = payment.gateway_reference,
    );
    Email {
        subject: "Đang hoàn tiền / Refund in progress".into(),
        html: layout("Đang hoàn tiền / Refund in progress", &content),
    }
}

pub fn refund_completed(payment: &Payment) -> Email {
    let content = format!(
        "<p>Đã hoàn tất hoàn tiền {amount} (mã {reference}).<br>\
         Your refund of {amount} (reference {reference}) is complete.</p>",
        amount = money(payment.amount),
        reference = payment.gateway_reference,
    );
    Email {
        subject: "Hoàn tiền thành công / Refund completed".into(),
        html: layout("Hoàn tiền thành công / Refund completed", &content),
    }
}

pub fn technician_assigned(booking: &Booking, description: &str) -> Email {
    let content = format!(
        "<p>Bạn được phân công lịch hẹn #{id} lúc {date} tại {address}.<br>\
         You have been assigned booking #{id} on {date} at {address}.</p><p>{description}</p>",
        id = short_id(booking.id),
        date = local_date(booking.schedule_date),
        address = booking.address,
    );
    Email {
        subject: format!("Nhiệm vụ mới / New mission #{}", short_id(booking.id)),
        html: layout("Nhiệm vụ mới / New mission", &content),
    }
}

pub fn booking_cancelled(booking: &Booking) -> Email {
    let reason = booking.cancel_reason.as_deref().unwrap_or("-");
    let content = format!(
        "<p>Lịch hẹn #{id} ngày {date} đã bị hủy. Lý do: {reason}<br>\
         Booking #{id} on {date} has been cancelled. Reason: {reason}</p>",
        id = short_id(booking.id),
        date = local_date(booking.schedule_date),
    );
    Email {
        subject: format!("Hủy lịch hẹn / Booking cancelled #{}", short_id(booking.id)),
        html: layout("Hủy lịch hẹn / Booking cancelled", &content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_money_format() {
        assert_eq!(money(Decimal::new(2250, 2)), "22.5 VND");
        assert_eq!(money(Decimal::from(150_000)), "150000 VND");
    }

    #[test]
    fn test_local_date_is_gmt7() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 20, 30, 0).unwrap();
        assert_eq!(local_date(at), "02/03/2026 03:30");
    }
}
