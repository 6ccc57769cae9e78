//! In-session coupon assignments

use crate::error::CouponError;
use crate::types::{Coupon, CouponAssignment};

/// Coupons applied in the current session.
///
/// A member holds at most one coupon and a coupon goes to at most one member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CouponBook {
    assignments: Vec<CouponAssignment>,
}

impl CouponBook {
    pub fn new() -> Self {
        Self { assignments: Vec::new() }
    }

    /// Rebuild a book from persisted assignments, enforcing both constraints
    pub fn from_assignments(assignments: Vec<CouponAssignment>) -> Result<Self, CouponError> {
        let mut book = Self::new();
        for assignment in assignments {
            book.insert(assignment)?;
        }
        Ok(book)
    }

    /// Append an already priced assignment, e.g. one read back from the store
    pub fn insert(&mut self, assignment: CouponAssignment) -> Result<(), CouponError> {
        self.check(&assignment.coupon_id, &assignment.member_name)?;
        self.assignments.push(assignment);
        Ok(())
    }

    /// Assign an active coupon to a member
    pub fn add(
        &mut self,
        coupon: &Coupon,
        member_name: &str,
    ) -> Result<&CouponAssignment, CouponError> {
        if !coupon.is_active() {
            return Err(CouponError::CouponNotActive { coupon_id: coupon.id.clone() });
        }
        self.check(&coupon.id, member_name)?;

        self.assignments.push(CouponAssignment {
            coupon_id: coupon.id.clone(),
            discount_amount: coupon.discount_amount,
            member_name: member_name.trim().to_string(),
        });
        Ok(&self.assignments[self.assignments.len() - 1])
    }

    /// Remove the assignment at `index`
    pub fn remove(&mut self, index: usize) -> Result<CouponAssignment, CouponError> {
        if index >= self.assignments.len() {
            return Err(CouponError::IndexOutOfRange { index, len: self.assignments.len() });
        }
        Ok(self.assignments.remove(index))
    }

    /// Put a removed assignment back where it was
    pub fn restore(&mut self, index: usize, assignment: CouponAssignment) {
        let index = index.min(self.assignments.len());
        self.assignments.insert(index, assignment);
    }

    pub fn for_member(&self, member_name: &str) -> Option<&CouponAssignment> {
        let member_name = member_name.trim();
        self.assignments.iter().find(|a| a.member_name == member_name)
    }

    pub fn for_coupon(&self, coupon_id: &str) -> Option<&CouponAssignment> {
        self.assignments.iter().find(|a| a.coupon_id == coupon_id)
    }

    pub fn assignments(&self) -> &[CouponAssignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn check(&self, coupon_id: &str, member_name: &str) -> Result<(), CouponError> {
        let member_name = member_name.trim();
        if member_name.is_empty() {
            return Err(CouponError::EmptyMemberName);
        }
        if let Some(existing) = self.for_member(member_name) {
            return Err(CouponError::MemberAlreadyHasCoupon {
                member: member_name.to_string(),
                coupon_id: existing.coupon_id.clone(),
            });
        }
        if let Some(existing) = self.for_coupon(coupon_id) {
            return Err(CouponError::CouponAlreadyAssigned {
                coupon_id: coupon_id.to_string(),
                member: existing.member_name.clone(),
            });
        }
        Ok(())
    }
}
