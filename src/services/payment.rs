use mongodb::bson::{doc, oid::ObjectId, DateTime};

use crate::db::DbConn;
use crate::models::{
    Bid, Gig, GigPaymentStatus, GigStatus, Payment, PaymentStatus, Profile, VerifyPaymentDto,
};
use crate::services::notify::NotificationService;
use crate::services::razorpay::RazorpayService;
use crate::services::realtime::EventHub;
use crate::utils::ApiError;

/// Single settle path for a gig: open an order against the gateway, then
/// finalize on the signed callback. Both the gig and payment route groups
/// go through here.
pub struct PaymentService;

impl PaymentService {
    /// Preconditions: caller owns the gig, the gig is awaiting payment
    /// with an accepted bid, and the accepted freelancer has a payable
    /// UPI handle on their profile.
    pub async fn create_order(
        db: &DbConn,
        gig_id: &ObjectId,
        caller: &ObjectId,
    ) -> Result<serde_json::Value, ApiError> {
        let gig = load_gig(db, gig_id).await?;
        gig.require_owner(caller, "Not authorized to create payment for this gig.")?;
        gig.require_status(
            GigStatus::AwaitingPayment,
            "Gig must be awaiting payment to create an order.",
        )?;

        let bid_id = gig
            .accepted_bid
            .ok_or_else(|| ApiError::bad_request("No freelancer assigned to this gig."))?;

        let bid = db
            .collection::<Bid>("bids")
            .find_one(doc! { "_id": bid_id }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
            .ok_or_else(|| ApiError::not_found("Accepted bid not found"))?;

        let profile = db
            .collection::<Profile>("profiles")
            .find_one(doc! { "user": bid.user }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        let upi_id = match profile {
            Some(profile) if !profile.upi_id.is_empty() => profile.upi_id,
            _ => return Err(ApiError::bad_request("Freelancer does not have a UPI ID.")),
        };

        let amount_paise = (gig.price * 100.0).round() as i64;
        let receipt = format!("gig_{}", gig_id.to_hex());

        let order = RazorpayService::create_order(amount_paise, &receipt)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to create payment order: {}", e)))?;

        let order_id = order
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::internal_error("Gateway returned no order id"))?
            .to_string();

        let payment = Payment {
            id: None,
            gig: *gig_id,
            client: *caller,
            freelancer: bid.user,
            amount: gig.price,
            razorpay_order_id: order_id.clone(),
            razorpay_payment_id: None,
            razorpay_signature: None,
            status: PaymentStatus::Created,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };

        db.collection::<Payment>("payments")
            .insert_one(&payment, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to record payment: {}", e)))?;

        Ok(serde_json::json!({
            "orderId": order_id,
            "amount": amount_paise,
            "currency": "INR",
            "key": crate::config::Config::razorpay_key_id(),
            "freelancerUpi": upi_id
        }))
    }

    /// Verifies the gateway callback and completes the gig. A signature
    /// mismatch marks the payment failed and leaves the gig untouched so
    /// the client can retry with a fresh order.
    pub async fn verify_callback(
        db: &DbConn,
        hub: &EventHub,
        gig_id: &ObjectId,
        caller: &ObjectId,
        dto: &VerifyPaymentDto,
    ) -> Result<serde_json::Value, ApiError> {
        let gig = load_gig(db, gig_id).await?;
        gig.require_owner(caller, "User not authorized to complete this gig.")?;
        gig.require_status(
            GigStatus::AwaitingPayment,
            "Gig must be awaiting payment to be completed.",
        )?;

        let payments = db.collection::<Payment>("payments");
        let payment = payments
            .find_one(doc! { "razorpay_order_id": &dto.razorpay_order_id }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
            .ok_or_else(|| ApiError::not_found("Payment not found"))?;

        let secret = crate::config::Config::razorpay_key_secret()
            .ok_or_else(|| ApiError::internal_error("Missing Razorpay secret"))?;

        if !RazorpayService::verify_signature(
            &dto.razorpay_order_id,
            &dto.razorpay_payment_id,
            &dto.razorpay_signature,
            &secret,
        ) {
            payments
                .update_one(
                    doc! { "_id": payment.id },
                    doc! { "$set": {
                        "status": PaymentStatus::Failed,
                        "updated_at": DateTime::now()
                    }},
                    None,
                )
                .await
                .map_err(|e| ApiError::internal_error(e.to_string()))?;

            return Err(ApiError::bad_request(
                "Invalid signature. Payment verification failed.",
            ));
        }

        payments
            .update_one(
                doc! { "_id": payment.id },
                doc! { "$set": {
                    "razorpay_payment_id": &dto.razorpay_payment_id,
                    "razorpay_signature": &dto.razorpay_signature,
                    "status": PaymentStatus::Paid,
                    "updated_at": DateTime::now()
                }},
                None,
            )
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        db.collection::<Gig>("gigs")
            .update_one(
                doc! { "_id": gig_id },
                doc! { "$set": {
                    "status": GigStatus::Completed,
                    "payment_status": GigPaymentStatus::Paid,
                    "updated_at": DateTime::now()
                }},
                None,
            )
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        NotificationService::send(
            db,
            hub,
            payment.freelancer,
            format!("Payment of ₹{} received for gig: \"{}\"", gig.price, gig.title),
            Some(format!("/gigs/{}", gig_id.to_hex())),
        )
        .await?;

        Ok(serde_json::json!({
            "message": "Payment verified and gig completed"
        }))
    }
}

async fn load_gig(db: &DbConn, gig_id: &ObjectId) -> Result<Gig, ApiError> {
    db.collection::<Gig>("gigs")
        .find_one(doc! { "_id": gig_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Gig not found"))
}
