//! Inventory ledger: the only writer of stock quantities.

use crate::context::UnitContext;
use bloodbank_core::{
    BloodBankError, BloodBankId, BloodProduct, BloodType, InventoryFilter, InventoryUnit,
    InventoryUnitId, Result, UnitOfWork,
};

/// Decrements stock when blood ships and puts it back when it comes home.
///
/// Every call runs inside the caller's unit of work, so a failure later in the
/// same call undoes the stock change.
pub struct InventoryLedger<'c, 'e, U> {
    ctx: &'c mut UnitContext<'e, U>,
}

impl<'c, 'e, U: UnitOfWork> InventoryLedger<'c, 'e, U> {
    /// Borrow the context for ledger operations.
    pub const fn new(ctx: &'c mut UnitContext<'e, U>) -> Self {
        Self { ctx }
    }

    /// Take `quantity` units out of `unit_id` on behalf of `blood_bank_id`.
    ///
    /// Returns the unit as it stands after the decrement.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] if the unit does not exist
    /// - [`BloodBankError::InsufficientStock`] if the unit belongs to another
    ///   bank (reported as zero available) or holds fewer than `quantity`
    pub async fn reserve(
        &mut self,
        unit_id: InventoryUnitId,
        blood_bank_id: BloodBankId,
        quantity: u32,
    ) -> Result<InventoryUnit> {
        let mut unit = self
            .ctx
            .uow()
            .get_inventory_unit(unit_id)
            .await?
            .ok_or_else(|| BloodBankError::not_found("InventoryUnit", unit_id))?;

        let available = if unit.blood_bank_id == blood_bank_id {
            unit.quantity
        } else {
            0
        };
        if available < quantity {
            return Err(BloodBankError::InsufficientStock {
                unit_id: unit_id.to_string(),
                available,
                requested: quantity,
            });
        }

        let now = self.ctx.now();
        unit.quantity = available - quantity;
        unit.updated_at = now;
        self.ctx
            .uow()
            .set_inventory_quantity(unit_id, unit.quantity, now)
            .await?;

        tracing::debug!(
            unit_id = %unit_id,
            blood_bank_id = %blood_bank_id,
            quantity,
            remaining = unit.quantity,
            "Reserved stock"
        );
        Ok(unit)
    }

    /// Put `quantity` units back into stock.
    ///
    /// Increments `unit_id` if it still exists; otherwise creates a fresh unit
    /// for the bank with the configured restock expiry. Returns the unit that
    /// received the stock.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn restore(
        &mut self,
        unit_id: InventoryUnitId,
        blood_bank_id: BloodBankId,
        blood_product: &BloodProduct,
        blood_type: BloodType,
        quantity: u32,
    ) -> Result<InventoryUnitId> {
        let now = self.ctx.now();

        let existing = self.ctx.uow().get_inventory_unit(unit_id).await?;
        let restored_into = if let Some(unit) = existing {
            let quantity_after = unit.quantity.saturating_add(quantity);
            self.ctx
                .uow()
                .set_inventory_quantity(unit.id, quantity_after, now)
                .await?;
            unit.id
        } else {
            let expiry_date = self
                .ctx
                .days_from_today(self.ctx.env().config.restock_expiry_days);
            let unit = InventoryUnit {
                id: InventoryUnitId::new(),
                blood_bank_id,
                blood_product: blood_product.clone(),
                blood_type,
                quantity,
                expiry_date,
                added_by_id: None,
                created_at: now,
                updated_at: now,
            };
            self.ctx.uow().insert_inventory_unit(&unit).await?;
            tracing::info!(
                unit_id = %unit.id,
                blood_bank_id = %blood_bank_id,
                %expiry_date,
                "Created inventory unit for restocked blood"
            );
            unit.id
        };

        metrics::counter!("bloodbank.inventory.restored").increment(u64::from(quantity));
        Ok(restored_into)
    }

    /// Pick the unit to ship from when the caller names none: the bank's
    /// unexpired unit of the right product and group with enough stock and the
    /// earliest expiry.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn select_fifo(
        &mut self,
        blood_bank_id: BloodBankId,
        blood_product: &BloodProduct,
        blood_type: BloodType,
        quantity: u32,
    ) -> Result<Option<InventoryUnit>> {
        let filter = InventoryFilter {
            blood_bank: blood_bank_id,
            product: Some(blood_product.clone()),
            blood_type: Some(blood_type),
            min_quantity: quantity,
            not_expired_on: Some(self.ctx.today()),
        };
        let units = self.ctx.uow().find_inventory_units(&filter).await?;
        Ok(units.into_iter().min_by_key(|u| u.expiry_date))
    }
}
