use rust_decimal::Decimal;

use crate::error::AppError;

pub fn effective_tariff(snapshot: Decimal, tariff_override: Option<Decimal>) -> Decimal {
    tariff_override.unwrap_or(snapshot)
}

pub fn line_total(tariff: Decimal, quantity: Decimal) -> Result<Decimal, AppError> {
    tariff.checked_mul(quantity).ok_or_else(too_large)
}

/// Total after a partial line update: unset fields keep their previous values.
pub fn repriced_total(
    previous_effective: Decimal,
    previous_quantity: Decimal,
    new_quantity: Option<Decimal>,
    new_override: Option<Decimal>,
) -> Result<Decimal, AppError> {
    line_total(
        new_override.unwrap_or(previous_effective),
        new_quantity.unwrap_or(previous_quantity),
    )
}

/// Quantity and total of an existing line after adding `quantity` to it.
pub fn incremented(
    effective: Decimal,
    previous_quantity: Decimal,
    quantity: Decimal,
) -> Result<(Decimal, Decimal), AppError> {
    let quantity = previous_quantity.checked_add(quantity).ok_or_else(too_large)?;
    Ok((quantity, line_total(effective, quantity)?))
}

/// Request total once one line total is replaced; `None` for a new line.
pub fn adjusted_sum(
    current_sum: Decimal,
    previous_line: Option<Decimal>,
    new_line: Decimal,
) -> Result<Decimal, AppError> {
    current_sum
        .checked_sub(previous_line.unwrap_or(Decimal::ZERO))
        .and_then(|rest| rest.checked_add(new_line))
        .ok_or_else(too_large)
}

fn too_large() -> AppError {
    AppError::BadRequest("quantity or tariff too large".to_string())
}

pub fn ensure_positive_quantity(quantity: Decimal) -> Result<(), AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_positive_tariff(tariff: Decimal) -> Result<(), AppError> {
    if tariff <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "tariff must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
