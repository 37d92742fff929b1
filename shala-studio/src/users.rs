use log::info;
use shala_core::{CheckInData, PrimaryKey, UserData};

use crate::{Activity, StudioContext, StudioError, StudioResult, UpdatedUser};

/// Administration of accounts and their check-in balances
pub struct UserManager {
    context: StudioContext,
}

impl UserManager {
    pub fn new(context: &StudioContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn user(&self, user_id: PrimaryKey) -> StudioResult<UserData> {
        Ok(self.context.database.user_by_id(user_id).await?)
    }

    /// Check-ins of the user, most recent first
    pub async fn check_ins(&self, user_id: PrimaryKey) -> StudioResult<Vec<CheckInData>> {
        Ok(self.context.database.list_check_ins_by_user(user_id).await?)
    }

    /// Adds check-ins to the balance of a user
    pub async fn grant_check_ins(
        &self,
        actor: &UserData,
        user_id: PrimaryKey,
        amount: i32,
    ) -> StudioResult<UserData> {
        ensure_admin(actor)?;

        if amount <= 0 {
            return Err(StudioError::Invalid("Amount must be positive"));
        }

        let user = self
            .context
            .database
            .grant_check_ins(user_id, amount)
            .await?;

        info!(
            "{} granted {} check-ins to {}",
            actor.username, amount, user.username
        );

        self.context.emit(Activity::CheckInsGranted {
            user_id,
            amount,
            check_ins_left: user.check_ins_quantity,
        });

        Ok(user)
    }

    /// Changes the role or subscription of a user
    pub async fn update_user(
        &self,
        actor: &UserData,
        updated_user: UpdatedUser,
    ) -> StudioResult<UserData> {
        ensure_admin(actor)?;

        let user = self.context.database.update_user(updated_user).await?;

        info!("{} updated user {}", actor.username, user.username);

        Ok(user)
    }
}

fn ensure_admin(actor: &UserData) -> StudioResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(StudioError::Forbidden("Only admins can manage users"))
    }
}
